//! Room fan-out
//!
//! The subscription registry, the broker contract and its local and Redis
//! implementations.

mod broker;
mod dispatcher;
mod redis;
mod registry;

pub use broker::{BrokerError, GroupBroker, LocalBroker};
pub use dispatcher::{EventDispatcher, EventDispatcherConfig};
pub use redis::RedisBroker;
pub use registry::SubscriptionRegistry;
