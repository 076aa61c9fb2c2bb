//! Test doubles shared by the application tests.

use crate::adapters::artifacts::LayoutStore;
use crate::adapters::local::fs::FsAdapter;
use crate::domain::events::{SourceMetadata, TranscodeCompleteEvent, UploadCompletedEvent};
use crate::domain::hls::{MasterPlaylist, MASTER_PLAYLIST, MEDIA_PLAYLIST};
use crate::domain::layout::StoreLayout;
use crate::domain::ladder::QualityProfile;
use crate::ports::encoder::EncodeBackend;
use crate::ports::events::EventPublisher;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn upload_event(video_id: &str, content_type: &str, width: u32, height: u32) -> UploadCompletedEvent {
    UploadCompletedEvent {
        video_id: video_id.to_string(),
        user_id: "user-1".to_string(),
        title: format!("Video {video_id}"),
        content_type: content_type.to_string(),
        size_bytes: 1024,
        source_metadata: SourceMetadata {
            duration_seconds: 12.0,
            width,
            height,
            ..SourceMetadata::default()
        },
        uploaded_at: "2024-05-01T10:00:00Z".to_string(),
    }
}

pub async fn fs_store(root: &Path) -> (LayoutStore<FsAdapter>, FsAdapter) {
    let fs = FsAdapter::new(root, "rawvideos", "processedvideos");
    fs.ensure_buckets().await.unwrap();
    (LayoutStore::new(fs.clone(), StoreLayout::default()), fs)
}

/// Put an original into the source bucket where the pipeline expects it.
pub async fn seed_source(fs: &FsAdapter, video_id: &str, extension: &str) {
    let key = StoreLayout::default().source_key(video_id, extension);
    let path = fs.source_root().join(key);
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(&path, b"original bytes").await.unwrap();
}

/// Encoder that writes placeholder outputs instead of running ffmpeg.
/// With a delay, every call waits that long unless cancelled.
#[derive(Clone, Default)]
pub struct FakeEncoder {
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeEncoder {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..500 {
            if self.calls.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("encoder never reached {count} calls");
    }

    async fn enter(
        &self,
        call: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.calls.lock().unwrap().push(call.to_string());
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err("encode cancelled".into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EncodeBackend for FakeEncoder {
    async fn encode_adaptive(
        &self,
        _source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        self.enter("encode_adaptive", cancel).await?;
        for profile in ladder {
            let dir = out_dir.join(profile.name);
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(dir.join(MEDIA_PLAYLIST), b"#EXTM3U\n").await?;
            tokio::fs::write(dir.join("segment_000.ts"), b"ts").await?;
        }
        let master = out_dir.join(MASTER_PLAYLIST);
        MasterPlaylist::for_ladder(ladder).write_to(&master).await?;
        Ok(master)
    }

    async fn encode_renditions(
        &self,
        _source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, Box<dyn Error + Send + Sync>> {
        self.enter("encode_renditions", cancel).await?;
        tokio::fs::create_dir_all(out_dir).await?;
        let mut outputs = Vec::new();
        for profile in ladder {
            let path = out_dir.join(format!("{}.mp4", profile.name));
            tokio::fs::write(&path, b"mp4").await?;
            outputs.push(path);
        }
        Ok(outputs)
    }

    async fn extract_thumbnail(
        &self,
        _source: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.enter("extract_thumbnail", cancel).await?;
        tokio::fs::write(output, b"jpg").await?;
        Ok(())
    }

    async fn probe(
        &self,
        _source: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.enter("probe", cancel).await?;
        Ok(r#"{"streams":[{"codec_type":"video","width":1280,"height":720}],"format":{"duration":"12.0"}}"#.to_string())
    }
}

/// Publisher that keeps every event in memory.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<TranscodeCompleteEvent>>>,
    closed: Arc<AtomicUsize>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<TranscodeCompleteEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn ensure_topic(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    async fn publish_transcode_complete(
        &self,
        event: &TranscodeCompleteEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
