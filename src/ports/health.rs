use async_trait::async_trait;
use std::error::Error;

/// A dependency the service needs before it accepts work.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Key under which the result is reported.
    fn name(&self) -> &str;

    async fn check(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}
