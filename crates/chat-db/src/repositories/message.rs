//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::{Message, NewMessage};
use chat_core::traits::{MessageQuery, MessageRepository, RepoResult};
use chat_core::value_objects::RoomId;

use crate::mappers::MessageInsert;
use crate::models::MessageModel;

use super::error::{map_db_error, map_room_fk_violation};

/// PostgreSQL implementation of MessageRepository
///
/// `messages.id` is a `BIGSERIAL`, so ids increase with insertion order and the
/// database clock stamps `timestamp`.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(room_id = %message.room_id))]
    async fn create(&self, message: NewMessage) -> RepoResult<Message> {
        let insert = MessageInsert::new(&message);

        let row = sqlx::query_as::<_, MessageModel>(
            r#"
            INSERT INTO messages (chat_id, sender_id, content, file_url, timestamp)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, chat_id, sender_id, content, file_url, timestamp
            "#,
        )
        .bind(insert.chat_id)
        .bind(insert.sender_id)
        .bind(insert.content)
        .bind(insert.file_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_room_fk_violation(e, message.room_id))?;

        Ok(Message::from(row))
    }

    #[instrument(skip(self))]
    async fn list_by_room(
        &self,
        room_id: RoomId,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>> {
        let limit = query.effective_limit();

        let mut rows = match (query.before, query.after) {
            (Some(before), None) => {
                // Page backwards from the cursor
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT id, chat_id, sender_id, content, file_url, timestamp
                    FROM messages
                    WHERE chat_id = $1 AND id < $2
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(room_id.into_inner())
                .bind(before.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(after)) => {
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT id, chat_id, sender_id, content, file_url, timestamp
                    FROM messages
                    WHERE chat_id = $1 AND id > $2
                    ORDER BY id ASC
                    LIMIT $3
                    "#,
                )
                .bind(room_id.into_inner())
                .bind(after.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (Some(before), Some(after)) => {
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT id, chat_id, sender_id, content, file_url, timestamp
                    FROM messages
                    WHERE chat_id = $1 AND id > $2 AND id < $3
                    ORDER BY id ASC
                    LIMIT $4
                    "#,
                )
                .bind(room_id.into_inner())
                .bind(after.into_inner())
                .bind(before.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                // Latest page
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT id, chat_id, sender_id, content, file_url, timestamp
                    FROM messages
                    WHERE chat_id = $1
                    ORDER BY id DESC
                    LIMIT $2
                    "#,
                )
                .bind(room_id.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_db_error)?;

        // Always hand back oldest first
        rows.sort_by_key(|row| row.id);

        Ok(rows.into_iter().map(Message::from).collect())
    }
}
