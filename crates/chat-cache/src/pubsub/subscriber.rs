//! Redis Pub/Sub subscriber.
//!
//! Holds one dedicated Redis connection in a background task and fans every
//! received message out over a tokio broadcast channel. Subscriptions survive
//! reconnects: the set of channels is replayed after each new connection.

use crate::pubsub::{PubSubChannel, PubSubEvent};
use futures_util::StreamExt;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to parse event: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Received message from Pub/Sub
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the message was received on
    pub channel: PubSubChannel,
    /// Parsed event (if valid JSON)
    pub event: Option<PubSubEvent>,
    /// Raw payload
    pub payload: String,
}

impl ReceivedMessage {
    /// Create from raw Redis message
    fn from_redis(channel_name: &str, payload: String) -> Self {
        let channel = PubSubChannel::parse(channel_name);
        let event = serde_json::from_str(&payload).ok();

        Self {
            channel,
            event,
            payload,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Channel buffer size for broadcast
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Commands for subscription management
#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>, oneshot::Sender<SubscriberResult<()>>),
    Unsubscribe(Vec<String>, oneshot::Sender<SubscriberResult<()>>),
    Shutdown,
}

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    /// Currently subscribed channels
    subscribed: Arc<RwLock<HashSet<String>>>,
    /// Broadcast sender for messages
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    /// Control channel for subscription management
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    #[must_use]
    pub fn new(config: SubscriberConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let subscribed = Arc::new(RwLock::new(HashSet::new()));

        tokio::spawn(Self::listener_loop(
            config,
            subscribed.clone(),
            broadcast_tx.clone(),
            control_rx,
        ));

        Self {
            subscribed,
            broadcast_tx,
            control_tx,
        }
    }

    /// Background listener loop
    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<String>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &subscribed, &broadcast_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error, reconnecting...");
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        config.reconnect_delay_ms,
                    ))
                    .await;
                }
            }
        }
    }

    /// Run the listener until error or shutdown; `Ok(true)` means stop for good
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Replay subscriptions from before the reconnect
        {
            let channels = subscribed.read().await;
            for channel in channels.iter() {
                pubsub.subscribe(channel).await?;
            }
        }

        tracing::info!("Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel_name = msg.get_channel_name();
                            let payload: String = msg.get_payload().unwrap_or_default();

                            tracing::trace!(channel = %channel_name, "Received Pub/Sub message");

                            // No receivers is not an error
                            let _ = broadcast_tx.send(ReceivedMessage::from_redis(channel_name, payload));
                        }
                        None => {
                            tracing::warn!("Pub/Sub stream ended");
                            return Ok(false);
                        }
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(channels, reply)) => {
                            // The message stream borrows the connection
                            drop(stream);
                            let mut result = Ok(());
                            for channel in &channels {
                                match pubsub.subscribe(channel).await {
                                    Ok(()) => {
                                        subscribed.write().await.insert(channel.clone());
                                        tracing::debug!(channel = %channel, "Subscribed to channel");
                                    }
                                    Err(e) => {
                                        tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                                        result = Err(SubscriberError::Redis(e));
                                        break;
                                    }
                                }
                            }
                            let failed = result.is_err();
                            let _ = reply.send(result);
                            if failed {
                                // The connection is suspect; reconnect and replay
                                return Ok(false);
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(channels, reply)) => {
                            drop(stream);
                            // Forget the channels first so a reconnect never replays them
                            {
                                let mut set = subscribed.write().await;
                                for channel in &channels {
                                    set.remove(channel);
                                }
                            }
                            let mut result = Ok(());
                            for channel in &channels {
                                if let Err(e) = pubsub.unsubscribe(channel).await {
                                    tracing::error!(channel = %channel, error = %e, "Failed to unsubscribe");
                                    result = Err(SubscriberError::Redis(e));
                                    break;
                                }
                                tracing::debug!(channel = %channel, "Unsubscribed from channel");
                            }
                            let failed = result.is_err();
                            let _ = reply.send(result);
                            if failed {
                                return Ok(false);
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Shutdown) => {
                            return Ok(true);
                        }
                        None => {
                            tracing::warn!("Control channel closed");
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    async fn send_command<F>(&self, make: F) -> SubscriberResult<()>
    where
        F: FnOnce(oneshot::Sender<SubscriberResult<()>>) -> SubscriberCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SubscriberError::ChannelClosed)?
    }

    /// Subscribe to channels; resolves once Redis has acknowledged
    pub async fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names: Vec<String> = channels.iter().map(PubSubChannel::name).collect();
        self.send_command(|reply| SubscriberCommand::Subscribe(names, reply))
            .await
    }

    /// Unsubscribe from channels
    pub async fn unsubscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names: Vec<String> = channels.iter().map(PubSubChannel::name).collect();
        self.send_command(|reply| SubscriberCommand::Unsubscribe(names, reply))
            .await
    }

    /// Get a receiver for broadcast messages
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Get currently subscribed channels
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed.read().await.iter().cloned().collect()
    }

    /// Shutdown the subscriber
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.control_tx
            .send(SubscriberCommand::Shutdown)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("receivers", &self.broadcast_tx.receiver_count())
            .finish_non_exhaustive()
    }
}

/// Builder for subscriber
pub struct SubscriberBuilder {
    config: SubscriberConfig,
}

impl SubscriberBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SubscriberConfig::default(),
        }
    }

    /// Set Redis URL
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    /// Set broadcast buffer size
    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    /// Set reconnection delay
    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    /// Build and start the subscriber
    #[must_use]
    pub fn build(self) -> Subscriber {
        Subscriber::new(self.config)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}
