//! # chat-cache
//!
//! Redis layer used for cross-process room fan-out.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Pub/Sub**: Room events published by one gateway process reach every other
//!
//! ## Example
//!
//! ```ignore
//! use chat_cache::{PubSubChannel, PubSubEvent, Publisher, RedisPool, RedisPoolConfig};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let publisher = Publisher::new(pool.clone());
//!
//! let event = PubSubEvent::new(MESSAGE_CREATE, data);
//! publisher.publish(&PubSubChannel::room(room_id), &event).await?;
//! ```

pub mod pool;
pub mod pubsub;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export pubsub types
pub use pubsub::{
    PubSubChannel, PubSubEvent, Publisher, ReceivedMessage, Subscriber, SubscriberBuilder,
    SubscriberConfig, SubscriberError, SubscriberResult, MESSAGE_CREATE, ROOM_CHANNEL_PREFIX,
};
