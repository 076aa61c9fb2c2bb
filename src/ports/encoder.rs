use crate::domain::ladder::QualityProfile;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// External encoder and prober. Every call observes `cancel` and terminates
/// its child process when the token fires.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncodeBackend: Send + Sync {
    /// Write `<out_dir>/<profile>/playlist.m3u8` plus segments for each
    /// profile, then `<out_dir>/master.m3u8`. Returns the master path.
    async fn encode_adaptive(
        &self,
        source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Box<dyn Error + Send + Sync>>;

    /// One `<out_dir>/<profile>.mp4` per profile, in ladder order.
    async fn encode_renditions(
        &self,
        source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, Box<dyn Error + Send + Sync>>;

    async fn extract_thumbnail(
        &self,
        source: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Raw JSON report.
    async fn probe(
        &self,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}
