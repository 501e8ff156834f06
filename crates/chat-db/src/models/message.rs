//! Message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the `messages` table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub file_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}
