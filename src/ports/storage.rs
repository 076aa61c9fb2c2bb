use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Object-level access to a store split into a source bucket (originals)
/// and a processed bucket (outputs).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Download an object from the source bucket to a local path
    async fn download(&self, key: &str, local_path: &Path)
        -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Upload a local file to the processed bucket
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Artifact-level operations used by the pipeline. Upload operations return
/// the store-relative path recorded in the completion event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn download_source(
        &self,
        video_id: &str,
        extension: &str,
        dest: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Upload every file under `dir`, keeping the relative layout.
    async fn upload_hls(&self, video_id: &str, dir: &Path)
        -> Result<String, Box<dyn Error + Send + Sync>>;

    async fn upload_renditions(
        &self,
        video_id: &str,
        files: &[PathBuf],
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    async fn upload_thumbnail(
        &self,
        video_id: &str,
        path: &Path,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}
