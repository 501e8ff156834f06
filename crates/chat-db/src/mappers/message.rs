//! Message entity <-> model mapper

use chat_core::entities::{Message, NewMessage};
use chat_core::value_objects::{MessageId, RoomId, UserId};

use crate::models::MessageModel;

/// Convert MessageModel to Message entity
impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        Message {
            id: MessageId::new(model.id),
            room_id: RoomId::new(model.chat_id),
            sender_id: UserId::new(model.sender_id),
            content: model.content,
            attachment: model.file_url.filter(|url| !url.is_empty()),
            created_at: model.timestamp,
        }
    }
}

/// Values bound into the `INSERT INTO messages` statement
pub struct MessageInsert<'a> {
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub file_url: Option<&'a str>,
}

impl<'a> MessageInsert<'a> {
    pub fn new(message: &'a NewMessage) -> Self {
        Self {
            chat_id: message.room_id.into_inner(),
            sender_id: message.sender_id.into_inner(),
            content: &message.content,
            file_url: message.attachment.as_deref(),
        }
    }
}
