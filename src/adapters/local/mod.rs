//! Local adapters: directory-backed store and Redis Streams broker.

pub mod fs;
pub mod redis;

pub use fs::FsAdapter;
pub use self::redis::{RedisPool, RedisStreamConsumer, RedisStreamPublisher};
