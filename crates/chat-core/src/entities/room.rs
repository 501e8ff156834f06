//! Room entity - a chat between a fixed set of members

use chrono::{DateTime, Utc};

use crate::value_objects::{RoomId, UserId};

/// Room entity
///
/// Membership is owned by the CRUD side; the gateway only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    /// Members in join order
    pub members: Vec<UserId>,
    /// Denormalized preview of the latest message, best-effort
    pub last_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: RoomId, members: Vec<UserId>) -> Self {
        Self {
            id,
            members,
            last_message: None,
            updated_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Number of members
    #[inline]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
