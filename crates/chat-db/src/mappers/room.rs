//! Room entity <-> model mapper

use chat_core::entities::Room;
use chat_core::value_objects::{RoomId, UserId};

use crate::models::RoomModel;

/// Build a Room from its `chats` row and the ordered `chats_members` user ids
pub fn room_from_parts(model: RoomModel, member_ids: Vec<i64>) -> Room {
    Room {
        id: RoomId::new(model.id),
        members: member_ids.into_iter().map(UserId::new).collect(),
        last_message: Some(model.last_message).filter(|s| !s.is_empty()),
        updated_at: model.timestamp,
    }
}
