//! Group subscription registry
//!
//! Maps room ids to the live connections subscribed to them. Each room has
//! its own lock: delivering into a room holds that lock while frames are
//! queued, so every subscriber sees a room's publishes in the same order.
//! Queueing never blocks, so a slow subscriber cannot stall the others.

use crate::connection::{Connection, ConnectionId, PushOutcome};
use chat_core::RoomId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type RoomGroup = HashMap<ConnectionId, Arc<Connection>>;

/// Room id → subscribed connections
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    rooms: DashMap<RoomId, Arc<Mutex<RoomGroup>>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a connection to a room. Idempotent.
    ///
    /// Returns true when the room had no subscribers before this call.
    pub fn subscribe(&self, room_id: RoomId, connection: &Arc<Connection>) -> bool {
        // The entry guard is held while inserting so a concurrent unsubscribe
        // cannot drop the group out from under us
        let entry = self.rooms.entry(room_id).or_default();
        let mut group = entry.lock();
        let first = group.is_empty();
        group.insert(connection.id(), Arc::clone(connection));
        first
    }

    /// Remove a connection from a room. Unknown pairs are a no-op.
    ///
    /// Returns true when this call removed the room's last subscriber.
    pub fn unsubscribe(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let mut removed = false;
        let emptied = self
            .rooms
            .remove_if(&room_id, |_, group| {
                let mut group = group.lock();
                removed = group.remove(&connection_id).is_some();
                group.is_empty()
            })
            .is_some();

        let last = removed && emptied;
        if removed {
            tracing::trace!(
                connection_id = %connection_id,
                room_id = %room_id,
                last,
                "Connection unsubscribed"
            );
        }
        last
    }

    /// Queue a serialized frame for every subscriber of a room.
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn deliver(&self, room_id: RoomId, frame: &Arc<str>) -> usize {
        let Some(group) = self.rooms.get(&room_id).map(|g| Arc::clone(g.value())) else {
            return 0;
        };

        let group = group.lock();
        let delivered = group
            .values()
            .filter(|conn| conn.enqueue(Arc::clone(frame)) != PushOutcome::Closed)
            .count();

        tracing::trace!(room_id = %room_id, delivered, "Frame delivered to room");
        delivered
    }

    pub fn is_subscribed(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|group| group.lock().contains_key(&connection_id))
    }

    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map_or(0, |group| group.lock().len())
    }

    /// Number of rooms with at least one subscriber
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total subscriptions across all rooms
    pub fn total_subscriptions(&self) -> usize {
        self.rooms.iter().map(|group| group.lock().len()).sum()
    }
}
