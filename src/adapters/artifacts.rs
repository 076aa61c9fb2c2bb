use crate::domain::layout::{content_type_for, StoreLayout};
use crate::ports::storage::{ArtifactStore, StoragePort};
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Maps artifact operations onto object keys for any StoragePort.
#[derive(Clone)]
pub struct LayoutStore<S> {
    storage: S,
    layout: StoreLayout,
}

impl<S> LayoutStore<S>
where
    S: StoragePort,
{
    pub fn new(storage: S, layout: StoreLayout) -> Self {
        Self { storage, layout }
    }

    async fn put(&self, local: &Path, key: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let content_type = content_type_for(local);
        self.storage.upload(local, key, &content_type).await?;
        debug!(key, %content_type, "stored artifact");
        Ok(())
    }
}

#[async_trait]
impl<S> ArtifactStore for LayoutStore<S>
where
    S: StoragePort,
{
    async fn download_source(
        &self,
        video_id: &str,
        extension: &str,
        dest: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = self.layout.source_key(video_id, extension);
        self.storage.download(&key, dest).await
    }

    async fn upload_hls(
        &self,
        video_id: &str,
        dir: &Path,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        if files.is_empty() {
            return Err(format!("no adaptive output under {}", dir.display()).into());
        }

        for file in &files {
            let relative = file.strip_prefix(dir)?;
            let key = self.layout.hls_key(video_id, relative);
            self.put(file, &key).await?;
        }
        Ok(self.layout.hls_dir(video_id))
    }

    async fn upload_renditions(
        &self,
        video_id: &str,
        files: &[PathBuf],
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        for file in files {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| format!("invalid rendition path {}", file.display()))?;
            let key = self.layout.mp4_key(video_id, name);
            self.put(file, &key).await?;
        }
        Ok(self.layout.mp4_dir(video_id))
    }

    async fn upload_thumbnail(
        &self,
        video_id: &str,
        path: &Path,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let key = self.layout.thumbnail_key(video_id);
        self.put(path, &key).await?;
        Ok(key)
    }
}
