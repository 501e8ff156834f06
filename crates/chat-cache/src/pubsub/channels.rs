//! Pub/Sub channel definitions.
//!
//! Defines the channel naming conventions for Redis Pub/Sub.

use chat_core::RoomId;

/// Channel prefix for room events
pub const ROOM_CHANNEL_PREFIX: &str = "room:";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Events for every member connected to a room
    Room(RoomId),
    /// Custom channel name
    Custom(String),
}

impl PubSubChannel {
    /// Create a room channel
    #[must_use]
    pub fn room(room_id: RoomId) -> Self {
        Self::Room(room_id)
    }

    /// Create a custom channel
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Room(id) => format!("{ROOM_CHANNEL_PREFIX}{id}"),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        name.strip_prefix(ROOM_CHANNEL_PREFIX)
            .and_then(|id| RoomId::parse(id).ok())
            .map_or_else(|| Self::Custom(name.to_string()), Self::Room)
    }

    /// Room id if this is a room channel
    #[must_use]
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::Room(id) => Some(*id),
            Self::Custom(_) => None,
        }
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
