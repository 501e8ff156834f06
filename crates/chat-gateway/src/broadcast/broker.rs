//! Group-messaging backends
//!
//! Sessions talk to a [`GroupBroker`]; which one is behind it is decided once
//! at startup.

use super::SubscriptionRegistry;
use crate::connection::{Connection, ConnectionId};
use crate::protocol::ChatFrame;
use async_trait::async_trait;
use chat_core::RoomId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Failed to serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Publish(#[from] chat_cache::RedisPoolError),

    #[error("Subscription change failed: {0}")]
    Subscription(#[from] chat_cache::SubscriberError),

    #[error("Redis did not answer within {0:?}")]
    Timeout(Duration),
}

/// Room fan-out contract
#[async_trait]
pub trait GroupBroker: Send + Sync {
    /// Start delivering a room's frames to `connection`. Idempotent.
    async fn subscribe(&self, room_id: RoomId, connection: &Arc<Connection>)
        -> Result<(), BrokerError>;

    /// Stop delivering to `connection`. Unknown pairs are a no-op.
    async fn unsubscribe(&self, room_id: RoomId, connection_id: ConnectionId)
        -> Result<(), BrokerError>;

    /// Deliver `frame` to every subscriber of the room, the sender included
    async fn publish(&self, room_id: RoomId, frame: &ChatFrame) -> Result<(), BrokerError>;

    /// The registry this process delivers into
    fn registry(&self) -> &SubscriptionRegistry;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Single-process broker: publish delivers straight into the registry
#[derive(Debug, Clone)]
pub struct LocalBroker {
    registry: Arc<SubscriptionRegistry>,
}

impl LocalBroker {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl GroupBroker for LocalBroker {
    async fn subscribe(
        &self,
        room_id: RoomId,
        connection: &Arc<Connection>,
    ) -> Result<(), BrokerError> {
        self.registry.subscribe(room_id, connection);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
    ) -> Result<(), BrokerError> {
        self.registry.unsubscribe(room_id, connection_id);
        Ok(())
    }

    async fn publish(&self, room_id: RoomId, frame: &ChatFrame) -> Result<(), BrokerError> {
        let json: Arc<str> = Arc::from(frame.to_json()?);
        self.registry.deliver(room_id, &json);
        Ok(())
    }

    fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{Identity, MessageId, NewMessage, UserId};
    use chrono::Utc;

    fn frame(id: i64, content: &str) -> ChatFrame {
        let message = NewMessage::new(RoomId::new(7), UserId::new(1), content)
            .into_message(MessageId::new(id), Utc::now());
        ChatFrame::from_message(&message, &Identity::anonymous(UserId::new(1)))
    }

    #[tokio::test]
    async fn test_publish_echoes_to_sender_and_peers() {
        let broker = LocalBroker::new(SubscriptionRegistry::new_shared());
        let sender = Connection::new(8);
        let peer = Connection::new(8);
        broker.subscribe(RoomId::new(7), &sender).await.unwrap();
        broker.subscribe(RoomId::new(7), &peer).await.unwrap();

        broker.publish(RoomId::new(7), &frame(1, "hi")).await.unwrap();

        for conn in [&sender, &peer] {
            let json = conn.next_outbound().await.unwrap();
            let got = ChatFrame::from_json(&json).unwrap();
            assert_eq!(got.id, MessageId::new(1));
            assert_eq!(got.content, "hi");
        }
    }

    #[tokio::test]
    async fn test_unsubscribed_connection_gets_nothing() {
        let broker = LocalBroker::new(SubscriptionRegistry::new_shared());
        let conn = Connection::new(8);
        broker.subscribe(RoomId::new(7), &conn).await.unwrap();
        broker.unsubscribe(RoomId::new(7), conn.id()).await.unwrap();
        broker.unsubscribe(RoomId::new(7), conn.id()).await.unwrap();

        broker.publish(RoomId::new(7), &frame(1, "hi")).await.unwrap();

        assert_eq!(conn.outbound_len(), 0);
        assert_eq!(broker.registry().room_count(), 0);
    }
}
