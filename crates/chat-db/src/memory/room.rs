//! In-memory RoomRepository

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use chat_core::entities::Room;
use chat_core::traits::{RepoResult, RoomRepository};
use chat_core::value_objects::{RoomId, UserId};
use chat_core::DomainError;

/// Room store backed by a `HashMap`
///
/// Membership can be changed at runtime, which lets tests revoke a member
/// while their connection is open.
#[derive(Debug, Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a room with the given members
    pub fn insert_room(&self, room_id: RoomId, members: impl IntoIterator<Item = UserId>) {
        let room = Room::new(room_id, members.into_iter().collect());
        self.rooms.write().insert(room_id, room);
    }

    /// Add a member; creates the room if needed
    pub fn add_member(&self, room_id: RoomId, user_id: UserId) {
        let mut rooms = self.rooms.write();
        let room = rooms
            .entry(room_id)
            .or_insert_with(|| Room::new(room_id, Vec::new()));
        if !room.is_member(user_id) {
            room.members.push(user_id);
        }
    }

    /// Remove a member; returns whether they were present
    pub fn remove_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get_mut(&room_id) else {
            return false;
        };
        let before = room.members.len();
        room.members.retain(|id| *id != user_id);
        room.members.len() != before
    }

    pub fn remove_room(&self, room_id: RoomId) -> bool {
        self.rooms.write().remove(&room_id).is_some()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_by_id(&self, id: RoomId) -> RepoResult<Option<Room>> {
        Ok(self.rooms.read().get(&id).cloned())
    }

    async fn is_member(&self, room_id: RoomId, user_id: UserId) -> RepoResult<bool> {
        Ok(self
            .rooms
            .read()
            .get(&room_id)
            .is_some_and(|room| room.is_member(user_id)))
    }

    async fn touch_last_message(&self, room_id: RoomId, preview: &str) -> RepoResult<()> {
        let mut rooms = self.rooms.write();
        let room = rooms
            .get_mut(&room_id)
            .ok_or(DomainError::RoomNotFound(room_id))?;
        room.last_message = Some(preview.to_string());
        room.updated_at = chrono::Utc::now();
        Ok(())
    }
}
