//! Error type for the Redis Streams broker adapter.

use deadpool_redis::CreatePoolError;
use std::fmt;

pub type RedisError = redis::RedisError;
pub type PoolError = deadpool_redis::PoolError;

#[derive(Debug)]
pub enum BrokerError {
    Redis(RedisError),
    Pool(PoolError),
    Serialization(serde_json::Error),
    CreatePool(String),
    Unreachable { attempts: u32, last: String },
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Redis(e) => write!(f, "Redis error: {}", e),
            BrokerError::Pool(e) => write!(f, "Pool error: {}", e),
            BrokerError::Serialization(e) => write!(f, "Serialization error: {}", e),
            BrokerError::CreatePool(e) => write!(f, "Create pool error: {}", e),
            BrokerError::Unreachable { attempts, last } => {
                write!(f, "broker unreachable after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for BrokerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrokerError::Redis(e) => Some(e),
            BrokerError::Pool(e) => Some(e),
            BrokerError::Serialization(e) => Some(e),
            BrokerError::CreatePool(_) | BrokerError::Unreachable { .. } => None,
        }
    }
}

impl From<RedisError> for BrokerError {
    fn from(err: RedisError) -> Self {
        BrokerError::Redis(err)
    }
}

impl From<PoolError> for BrokerError {
    fn from(err: PoolError) -> Self {
        BrokerError::Pool(err)
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Serialization(err)
    }
}

impl From<CreatePoolError> for BrokerError {
    fn from(err: CreatePoolError) -> Self {
        BrokerError::CreatePool(format!("{}", err))
    }
}
