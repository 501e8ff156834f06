//! Room (chat) database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the `chats` table
#[derive(Debug, Clone, FromRow)]
pub struct RoomModel {
    pub id: i64,
    /// Empty string when the room has no messages yet
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
}
