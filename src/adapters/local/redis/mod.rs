//! Redis Streams broker adapter.
//!
//! This module provides Redis-backed implementations of:
//! - `EventConsumer` reading upload events through a consumer group
//! - `EventPublisher` appending transcode-complete events
//! - `HealthCheck` for the broker dependency

mod consumer;
mod error;
mod pool;
mod producer;

pub use consumer::{ConsumerSettings, RedisStreamConsumer};
pub use error::BrokerError;
pub use pool::RedisPool;
pub use producer::RedisStreamPublisher;

/// Stream entry field holding the JSON event.
const PAYLOAD_FIELD: &str = "payload";
