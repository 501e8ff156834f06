//! Repository traits (ports) - define the interface for data access
//!
//! The gateway never owns the chat schema. Rooms and messages live in the
//! store the CRUD API writes to; these traits are the slice of it the gateway
//! needs.

use async_trait::async_trait;

use crate::entities::{Message, NewMessage, Room};
use crate::error::DomainError;
use crate::value_objects::{MessageId, RoomId, UserId};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Room Repository
// ============================================================================

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find room by ID
    async fn find_by_id(&self, id: RoomId) -> RepoResult<Option<Room>>;

    /// Check membership. A missing room is reported as `false`, not an error.
    async fn is_member(&self, room_id: RoomId, user_id: UserId) -> RepoResult<bool>;

    /// Update the denormalized last-message preview
    async fn touch_last_message(&self, room_id: RoomId, preview: &str) -> RepoResult<()>;
}

// ============================================================================
// Message Repository
// ============================================================================

/// Pagination options for message queries
///
/// `before` pages backwards from a cursor, `after` pages forwards. With both
/// set the page is the window strictly between them, read forwards from
/// `after`. With neither set the page is the latest `limit` messages.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub before: Option<MessageId>,
    pub after: Option<MessageId>,
    pub limit: i64,
}

impl MessageQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    /// Limit clamped to `1..=MAX_LIMIT`
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            before: None,
            after: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a message; the store assigns id and timestamp
    async fn create(&self, message: NewMessage) -> RepoResult<Message>;

    /// List messages in a room, oldest first
    async fn list_by_room(&self, room_id: RoomId, query: MessageQuery)
        -> RepoResult<Vec<Message>>;
}
