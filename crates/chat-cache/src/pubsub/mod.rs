//! Redis Pub/Sub module.
//!
//! Carries room events between gateway processes.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{PubSubChannel, ROOM_CHANNEL_PREFIX};
pub use publisher::{PubSubEvent, Publisher, MESSAGE_CREATE};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
