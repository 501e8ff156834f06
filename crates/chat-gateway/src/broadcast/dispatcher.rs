//! Event dispatcher
//!
//! Receives room events from Redis Pub/Sub and delivers them to the local
//! subscription registry.

use super::SubscriptionRegistry;
use chat_cache::{ReceivedMessage, Subscriber, SubscriberBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Configuration for the event dispatcher
#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Redis URL
    pub redis_url: String,
    /// Broadcast buffer size
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Routes Redis Pub/Sub messages to locally subscribed connections
pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
    subscriber: Arc<Subscriber>,
    running: Arc<AtomicBool>,
}

impl EventDispatcher {
    /// Create a dispatcher with its own Redis subscriber connection
    pub fn new(config: EventDispatcherConfig, registry: Arc<SubscriptionRegistry>) -> Self {
        let subscriber = SubscriberBuilder::new()
            .redis_url(&config.redis_url)
            .broadcast_buffer(config.broadcast_buffer)
            .reconnect_delay_ms(config.reconnect_delay_ms)
            .build();

        Self {
            registry,
            subscriber: Arc::new(subscriber),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The subscriber whose channels this dispatcher drains
    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }

    /// Start the event dispatcher
    ///
    /// Spawns a background task that receives messages from Redis and
    /// delivers them into the registry.
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher is already running");
            return;
        }

        // Take the receiver before returning so nothing published after a
        // subscribe ack can slip past us
        let receiver = self.subscriber.receiver();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run(receiver).await;
        });

        tracing::info!("Event dispatcher started");
    }

    /// Stop the event dispatcher
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.subscriber.shutdown().await.ok();
        tracing::info!("Event dispatcher stopped");
    }

    async fn run(&self, mut receiver: broadcast::Receiver<ReceivedMessage>) {
        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => self.handle_message(&msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Event dispatcher lagged behind, messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Event dispatcher channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Event dispatcher loop ended");
    }

    fn handle_message(&self, msg: &ReceivedMessage) {
        let Some(room_id) = msg.channel.room_id() else {
            tracing::debug!(channel = %msg.channel, "Event on non-room channel, ignoring");
            return;
        };

        let Some(event) = msg.event.as_ref().filter(|e| e.is_message_create()) else {
            tracing::debug!(
                channel = %msg.channel,
                "Received non-message event, ignoring"
            );
            return;
        };

        let frame: Arc<str> = match serde_json::to_string(&event.data) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "Failed to re-encode event");
                return;
            }
        };

        let delivered = self.registry.deliver(room_id, &frame);
        tracing::trace!(room_id = %room_id, delivered, "Event dispatched to room");
    }

    /// Check if the dispatcher is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("running", &self.is_running())
            .field("rooms", &self.registry.room_count())
            .finish()
    }
}
