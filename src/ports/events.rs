use crate::domain::events::TranscodeCompleteEvent;
use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;

/// One message read from the consumed topic. It stays pending on the broker
/// until acked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub payload: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Create the consumed topic and consumer group if absent.
    async fn ensure_topic(&self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Wait up to `block` for deliveries. An empty batch is not an error.
    async fn poll(&self, block: Duration) -> Result<Vec<Delivery>, Box<dyn Error + Send + Sync>>;

    async fn ack(&self, delivery_id: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Create the produced topic if absent. Safe to call repeatedly.
    async fn ensure_topic(&self) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn publish_transcode_complete(
        &self,
        event: &TranscodeCompleteEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}
