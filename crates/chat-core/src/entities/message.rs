//! Message entity - represents a persisted chat message

use chrono::{DateTime, Utc};

use crate::value_objects::{MessageId, RoomId, UserId};

/// Message entity
///
/// `id` and `created_at` are assigned by the message store, exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Get a truncated preview of the message (for the room's last-message cache)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }

    #[inline]
    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}

/// A message accepted by the gateway but not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub attachment: Option<String>,
}

impl NewMessage {
    pub fn new(room_id: RoomId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            room_id,
            sender_id,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<String>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Materialize with the id and timestamp chosen by the store
    pub fn into_message(self, id: MessageId, created_at: DateTime<Utc>) -> Message {
        Message {
            id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            attachment: self.attachment,
            created_at,
        }
    }
}
