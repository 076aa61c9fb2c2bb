//! Redis Streams EventPublisher implementation.

use super::error::BrokerError;
use super::pool::RedisPool;
use super::PAYLOAD_FIELD;
use crate::domain::events::TranscodeCompleteEvent;
use crate::ports::events::EventPublisher;
use crate::ports::health::HealthCheck;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::error::Error;
use tracing::info;

/// Appends completion events to the produced stream.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    pool: RedisPool,
    topic: String,
    /// Downstream consumer group provisioned with the stream.
    downstream_group: String,
}

impl RedisStreamPublisher {
    pub fn new(pool: RedisPool, topic: String, downstream_group: String) -> Self {
        Self {
            pool,
            topic,
            downstream_group,
        }
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn ensure_topic(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.pool
            .ensure_group(&self.topic, &self.downstream_group)
            .await?;
        Ok(())
    }

    async fn publish_transcode_complete(
        &self,
        event: &TranscodeCompleteEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let json = serde_json::to_string(event).map_err(BrokerError::from)?;
        let mut conn = self.pool.conn().await?;
        let id: String = conn
            .xadd(&self.topic, "*", &[(PAYLOAD_FIELD, json)])
            .await
            .map_err(BrokerError::from)?;
        info!(video_id = %event.video_id, entry = %id, topic = %self.topic, "published transcode complete");
        Ok(())
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.pool.close();
        Ok(())
    }
}

/// PING plus provisioning of the produced topic.
#[async_trait]
impl HealthCheck for RedisStreamPublisher {
    fn name(&self) -> &str {
        "broker"
    }

    async fn check(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.pool.ping().await?;
        self.ensure_topic().await
    }
}
