//! PostgreSQL implementation of RoomRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::Room;
use chat_core::traits::{RepoResult, RoomRepository};
use chat_core::value_objects::{RoomId, UserId};

use crate::mappers::room_from_parts;
use crate::models::RoomModel;

use super::error::{map_db_error, room_not_found};

/// PostgreSQL implementation of RoomRepository
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: RoomId) -> RepoResult<Option<Room>> {
        let Some(model) = sqlx::query_as::<_, RoomModel>(
            r#"
            SELECT id, last_message, timestamp
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        else {
            return Ok(None);
        };

        let member_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT user_id
            FROM chats_members
            WHERE chat_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(Some(room_from_parts(model, member_ids)))
    }

    #[instrument(skip(self))]
    async fn is_member(&self, room_id: RoomId, user_id: UserId) -> RepoResult<bool> {
        // A missing room has no member rows, so it reads as "not a member"
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM chats_members
                WHERE chat_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(room_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(exists)
    }

    #[instrument(skip(self, preview))]
    async fn touch_last_message(&self, room_id: RoomId, preview: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET last_message = $2
            WHERE id = $1
            "#,
        )
        .bind(room_id.into_inner())
        .bind(preview)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(room_not_found(room_id));
        }

        Ok(())
    }
}
