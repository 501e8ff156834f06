//! In-memory MessageRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use chat_core::entities::{Message, NewMessage};
use chat_core::traits::{MessageQuery, MessageRepository, RepoResult};
use chat_core::value_objects::{MessageId, RoomId};

#[derive(Debug, Default)]
struct Store {
    last_id: i64,
    by_room: HashMap<RoomId, Vec<Message>>,
}

/// Append-only message store
///
/// Ids come from one counter bumped under the store lock, so they increase
/// with insertion order inside every room.
#[derive(Debug, Default)]
pub struct InMemoryMessageRepository {
    store: Mutex<Store>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages stored for a room
    pub fn count(&self, room_id: RoomId) -> usize {
        self.store.lock().by_room.get(&room_id).map_or(0, Vec::len)
    }

    /// Total number of messages across all rooms
    pub fn total(&self) -> usize {
        self.store.lock().by_room.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> RepoResult<Message> {
        let mut store = self.store.lock();
        store.last_id += 1;
        let message = message.into_message(MessageId::new(store.last_id), Utc::now());
        store
            .by_room
            .entry(message.room_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>> {
        let limit = usize::try_from(query.effective_limit()).unwrap_or(usize::MAX);
        let store = self.store.lock();
        let Some(messages) = store.by_room.get(&room_id) else {
            return Ok(Vec::new());
        };

        let page: Vec<Message> = match (query.before, query.after) {
            (Some(before), None) => {
                let older: Vec<&Message> = messages.iter().filter(|m| m.id < before).collect();
                older[older.len().saturating_sub(limit)..]
                    .iter()
                    .map(|m| (*m).clone())
                    .collect()
            }
            (None, Some(after)) => messages
                .iter()
                .filter(|m| m.id > after)
                .take(limit)
                .cloned()
                .collect(),
            (Some(before), Some(after)) => messages
                .iter()
                .filter(|m| m.id > after && m.id < before)
                .take(limit)
                .cloned()
                .collect(),
            (None, None) => messages[messages.len().saturating_sub(limit)..].to_vec(),
        };

        Ok(page)
    }
}
