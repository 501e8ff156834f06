//! Cross-process broker over Redis Pub/Sub
//!
//! Frames are published to `room:{id}`. Every gateway process subscribes to a
//! room's channel while it has at least one local subscriber for that room,
//! and its [`EventDispatcher`] delivers what arrives into the local registry.
//! The publishing process receives its own frame back the same way, which is
//! how the sender gets its echo.
//!
//! Channel changes are serialized per room. Registry removals never wait on
//! Redis, so a stalled Redis only delays the room whose channel is changing.

use super::{BrokerError, EventDispatcher, GroupBroker, SubscriptionRegistry};
use crate::connection::{Connection, ConnectionId};
use crate::protocol::ChatFrame;
use async_trait::async_trait;
use chat_cache::{PubSubChannel, Publisher, SubscriberResult};
use chat_core::RoomId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long a SUBSCRIBE or UNSUBSCRIBE may wait for Redis
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisBroker {
    registry: Arc<SubscriptionRegistry>,
    publisher: Publisher,
    dispatcher: Arc<EventDispatcher>,
    /// Per-room lock; holds `true` while this process is subscribed to the channel
    channels: DashMap<RoomId, Arc<Mutex<bool>>>,
    command_timeout: Duration,
}

impl RedisBroker {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        publisher: Publisher,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            registry,
            publisher,
            dispatcher,
            channels: DashMap::new(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Whether this process currently holds the room's Redis channel
    pub fn holds_channel(&self, room_id: RoomId) -> bool {
        self.channels
            .get(&room_id)
            .is_some_and(|lock| lock.try_lock().is_ok_and(|held| *held))
    }

    fn channel_lock(&self, room_id: RoomId) -> Arc<Mutex<bool>> {
        self.channels.entry(room_id).or_default().clone()
    }

    /// Drop the room's lock once nobody holds or waits on it and the channel is released
    fn forget_channel_lock(&self, room_id: RoomId) {
        self.channels.remove_if(&room_id, |_, lock| {
            Arc::strong_count(lock) == 1 && lock.try_lock().is_ok_and(|held| !*held)
        });
    }

    async fn round_trip<F>(&self, command: F) -> Result<(), BrokerError>
    where
        F: Future<Output = SubscriberResult<()>>,
    {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(result) => result.map_err(BrokerError::from),
            Err(_) => Err(BrokerError::Timeout(self.command_timeout)),
        }
    }
}

#[async_trait]
impl GroupBroker for RedisBroker {
    async fn subscribe(
        &self,
        room_id: RoomId,
        connection: &Arc<Connection>,
    ) -> Result<(), BrokerError> {
        let lock = self.channel_lock(room_id);
        let mut held = lock.lock().await;

        self.registry.subscribe(room_id, connection);

        if !*held {
            // Resolves after Redis acknowledged the SUBSCRIBE
            let result = self
                .round_trip(
                    self.dispatcher
                        .subscriber()
                        .subscribe(&[PubSubChannel::room(room_id)]),
                )
                .await;

            if let Err(e) = result {
                self.registry.unsubscribe(room_id, connection.id());
                drop(held);
                drop(lock);
                self.forget_channel_lock(room_id);
                return Err(e);
            }

            *held = true;
            tracing::debug!(room_id = %room_id, "Subscribed to room channel");
        }

        Ok(())
    }

    async fn unsubscribe(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
    ) -> Result<(), BrokerError> {
        self.registry.unsubscribe(room_id, connection_id);
        if self.registry.subscriber_count(room_id) > 0 {
            return Ok(());
        }

        let Some(lock) = self.channels.get(&room_id).map(|entry| entry.value().clone()) else {
            return Ok(());
        };

        {
            let mut held = lock.lock().await;
            // A subscriber may have arrived while we waited
            if *held && self.registry.subscriber_count(room_id) == 0 {
                self.round_trip(
                    self.dispatcher
                        .subscriber()
                        .unsubscribe(&[PubSubChannel::room(room_id)]),
                )
                .await?;

                *held = false;
                tracing::debug!(room_id = %room_id, "Unsubscribed from room channel");
            }
        }

        drop(lock);
        self.forget_channel_lock(room_id);
        Ok(())
    }

    async fn publish(&self, room_id: RoomId, frame: &ChatFrame) -> Result<(), BrokerError> {
        let data = serde_json::to_value(frame)?;
        let receivers = self.publisher.publish_room_message(room_id, data).await?;
        tracing::trace!(room_id = %room_id, receivers, "Frame published to Redis");
        Ok(())
    }

    fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("publisher", &self.publisher)
            .field("dispatcher", &self.dispatcher)
            .field("rooms", &self.channels.len())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::EventDispatcherConfig;
    use chat_cache::{RedisPool, RedisPoolConfig};

    // Nothing listens here, so the subscriber never gets past its reconnect loop
    const UNREACHABLE_REDIS: &str = "redis://127.0.0.1:1";

    fn stalled_broker(timeout: Duration) -> RedisBroker {
        let registry = SubscriptionRegistry::new_shared();
        let dispatcher = Arc::new(EventDispatcher::new(
            EventDispatcherConfig {
                redis_url: UNREACHABLE_REDIS.to_string(),
                reconnect_delay_ms: 50,
                ..EventDispatcherConfig::default()
            },
            registry.clone(),
        ));
        let pool = RedisPool::new(RedisPoolConfig {
            url: UNREACHABLE_REDIS.to_string(),
            max_connections: 1,
        })
        .unwrap();

        RedisBroker::new(registry, Publisher::new(pool), dispatcher).with_command_timeout(timeout)
    }

    async fn wait_subscribed(broker: &RedisBroker, room: RoomId, conn: ConnectionId) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !broker.registry().is_subscribed(room, conn) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_subscribe_times_out_and_rolls_back() {
        let broker = stalled_broker(Duration::from_millis(200));
        let conn = Connection::new(8);

        let err = broker.subscribe(RoomId::new(1), &conn).await.unwrap_err();

        assert!(matches!(err, BrokerError::Timeout(_)));
        assert_eq!(broker.registry().total_subscriptions(), 0);
        assert!(!broker.holds_channel(RoomId::new(1)));
    }

    #[tokio::test]
    async fn test_stalled_room_does_not_block_unsubscribes() {
        let broker = Arc::new(stalled_broker(Duration::from_secs(30)));
        let pending_conn = Connection::new(8);

        let pending = tokio::spawn({
            let broker = broker.clone();
            let conn = pending_conn.clone();
            async move { broker.subscribe(RoomId::new(1), &conn).await }
        });
        wait_subscribed(&broker, RoomId::new(1), pending_conn.id()).await;

        // Another room
        let elsewhere = Connection::new(8);
        broker.registry().subscribe(RoomId::new(2), &elsewhere);
        tokio::time::timeout(
            Duration::from_secs(1),
            broker.unsubscribe(RoomId::new(2), elsewhere.id()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!broker.registry().is_subscribed(RoomId::new(2), elsewhere.id()));

        // The same room, while its channel change is still pending
        let neighbour = Connection::new(8);
        broker.registry().subscribe(RoomId::new(1), &neighbour);
        tokio::time::timeout(
            Duration::from_secs(1),
            broker.unsubscribe(RoomId::new(1), neighbour.id()),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!broker.registry().is_subscribed(RoomId::new(1), neighbour.id()));

        pending.abort();
    }
}
