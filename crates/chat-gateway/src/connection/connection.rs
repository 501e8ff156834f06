//! Individual WebSocket connection
//!
//! The handle the registry holds for a live transport stream. Delivery goes
//! through the bounded outbound queue, never straight to the socket.

use super::outbound::{OutboundQueue, PushOutcome};
use super::state::{InvalidTransition, SessionState};
use chat_core::{Identity, RoomId, UserId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Process-unique connection id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A single WebSocket connection
pub struct Connection {
    id: ConnectionId,

    /// Attached once, after verification
    identity: OnceLock<Identity>,

    /// At most one room per connection
    room: Mutex<Option<RoomId>>,

    state: Mutex<SessionState>,

    outbound: OutboundQueue,

    /// Last time anything arrived from the client
    last_seen: Mutex<Instant>,

    created_at: Instant,
}

impl Connection {
    /// Create a new connection in `Connecting`
    pub fn new(outbound_capacity: usize) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            id: ConnectionId::generate(),
            identity: OnceLock::new(),
            room: Mutex::new(None),
            state: Mutex::new(SessionState::Connecting),
            outbound: OutboundQueue::new(outbound_capacity),
            last_seen: Mutex::new(now),
            created_at: now,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.identity.get().map(Identity::id)
    }

    /// Attach the verified identity; returns false if one was already attached
    pub fn attach_identity(&self, identity: Identity) -> bool {
        self.identity.set(identity).is_ok()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.get().is_some()
    }

    pub fn room(&self) -> Option<RoomId> {
        *self.room.lock()
    }

    pub fn set_room(&self, room_id: Option<RoomId>) {
        *self.room.lock() = room_id;
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to `next` if the lifecycle allows it
    pub fn transition(&self, next: SessionState) -> Result<SessionState, InvalidTransition> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *state,
                to: next,
            });
        }
        let previous = *state;
        *state = next;
        Ok(previous)
    }

    /// Queue a serialized frame for delivery; never blocks
    pub fn enqueue(&self, frame: Arc<str>) -> PushOutcome {
        let outcome = self.outbound.push(frame);
        if outcome == PushOutcome::DroppedOldest {
            tracing::debug!(
                connection_id = %self.id,
                dropped = self.outbound.dropped(),
                "Outbound queue full, dropped oldest frame"
            );
        }
        outcome
    }

    /// Wait for the next queued frame
    pub async fn next_outbound(&self) -> Option<Arc<str>> {
        self.outbound.pop().await
    }

    /// Stop accepting frames and wake the writer
    pub fn close_outbound(&self) {
        self.outbound.close();
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.outbound.dropped()
    }

    /// Record client activity
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id())
            .field("room", &self.room())
            .field("state", &self.state())
            .finish()
    }
}
