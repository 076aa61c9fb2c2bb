use crate::ports::health::HealthCheck;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Directory-backed store: each bucket is a directory under a common root,
/// each key a relative path inside it.
#[derive(Clone, Debug)]
pub struct FsAdapter {
    source_root: PathBuf,
    processed_root: PathBuf,
}

impl FsAdapter {
    pub fn new(root: impl AsRef<Path>, source_bucket: &str, processed_bucket: &str) -> Self {
        let root = root.as_ref();
        Self {
            source_root: root.join(source_bucket),
            processed_root: root.join(processed_bucket),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn processed_root(&self) -> &Path {
        &self.processed_root
    }

    pub async fn ensure_buckets(&self) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(&self.source_root).await?;
        tokio::fs::create_dir_all(&self.processed_root).await
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn download(
        &self,
        key: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key_path = self.source_root.join(key);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&key_path, local_path)
            .await
            .map_err(|e| format!("{}: {}", key_path.display(), e))?;
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        _content_type: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key_path = self.processed_root.join(key);
        if let Some(parent) = key_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &key_path).await?;
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for FsAdapter {
    fn name(&self) -> &str {
        "storage"
    }

    async fn check(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for root in [&self.source_root, &self.processed_root] {
            let is_dir = tokio::fs::metadata(root)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(format!("bucket directory {} missing", root.display()).into());
            }
        }
        Ok(())
    }
}
