//! Redis Streams EventConsumer implementation.

use super::error::BrokerError;
use super::pool::RedisPool;
use super::PAYLOAD_FIELD;
use crate::ports::events::{Delivery, EventConsumer};
use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Entries read per poll.
const BATCH_SIZE: usize = 16;

#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    pub topic: String,
    pub group: String,
    pub consumer: String,
    /// How often entries left pending (unacked) are read again.
    pub redelivery_interval: Duration,
}

/// Reads upload events through a consumer group. Entries stay in the group's
/// pending list until acked, so anything not acked is redelivered.
pub struct RedisStreamConsumer {
    pool: RedisPool,
    settings: ConsumerSettings,
    last_sweep: Mutex<Option<Instant>>,
}

impl RedisStreamConsumer {
    pub fn new(pool: RedisPool, settings: ConsumerSettings) -> Self {
        Self {
            pool,
            settings,
            last_sweep: Mutex::new(None),
        }
    }

    async fn sweep_due(&self) -> bool {
        let mut last = self.last_sweep.lock().await;
        let due = last.map_or(true, |at| at.elapsed() >= self.settings.redelivery_interval);
        if due {
            *last = Some(Instant::now());
        }
        due
    }

    async fn read(&self, start: &str, block: Option<Duration>) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.pool.conn().await?;
        let mut opts = StreamReadOptions::default()
            .group(&self.settings.group, &self.settings.consumer)
            .count(BATCH_SIZE);
        if let Some(block) = block {
            opts = opts.block(block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.settings.topic], &[start], &opts)
            .await?;

        Ok(reply.map(deliveries).unwrap_or_default())
    }
}

fn deliveries(reply: StreamReadReply) -> Vec<Delivery> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| {
            let payload = entry.get::<String>(PAYLOAD_FIELD).unwrap_or_else(|| {
                warn!(id = %entry.id, "stream entry without payload field");
                String::new()
            });
            Delivery {
                id: entry.id,
                payload,
            }
        })
        .collect()
}

#[async_trait]
impl EventConsumer for RedisStreamConsumer {
    async fn ensure_topic(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.pool
            .ensure_group(&self.settings.topic, &self.settings.group)
            .await?;
        Ok(())
    }

    async fn poll(&self, block: Duration) -> Result<Vec<Delivery>, Box<dyn Error + Send + Sync>> {
        if self.sweep_due().await {
            // "0" replays this consumer's pending entries instead of new ones
            let pending = self.read("0", None).await?;
            if !pending.is_empty() {
                debug!(count = pending.len(), "redelivering pending entries");
                return Ok(pending);
            }
        }
        Ok(self.read(">", Some(block)).await?)
    }

    async fn ack(&self, delivery_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.pool.conn().await?;
        conn.xack::<_, _, _, ()>(&self.settings.topic, &self.settings.group, &[delivery_id])
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.pool.close();
        Ok(())
    }
}
