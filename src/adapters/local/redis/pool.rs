//! Redis connection pool.

use super::error::BrokerError;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::time::Duration;
use tracing::{info, warn};

/// Shared pool for the stream consumer and publisher.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
}

impl RedisPool {
    /// Create a new RedisPool. No connection is opened yet.
    pub fn new(redis_url: &str) -> Result<Self, BrokerError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// Create the pool and wait until the server answers PING, retrying a
    /// bounded number of times.
    pub async fn connect(
        redis_url: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, BrokerError> {
        let pool = Self::new(redis_url)?;
        let mut last = String::new();
        for attempt in 1..=attempts {
            match pool.ping().await {
                Ok(()) => {
                    info!(attempt, "connected to broker");
                    return Ok(pool);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "broker not reachable");
                    last = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(BrokerError::Unreachable { attempts, last })
    }

    pub(super) async fn conn(&self) -> Result<Connection, BrokerError> {
        Ok(self.pool.get().await?)
    }

    pub async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }

    /// `XGROUP CREATE <stream> <group> 0 MKSTREAM`. An existing group is fine.
    pub(super) async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match created {
            Ok(()) => {
                info!(stream, group, "created stream group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
