use crate::domain::events::{TranscodeCompleteEvent, UploadCompletedEvent};
use crate::domain::ladder::{select_ladder, QualityProfile};
use crate::domain::probe::ProbeReport;
use crate::ports::encoder::EncodeBackend;
use crate::ports::events::EventPublisher;
use crate::ports::storage::ArtifactStore;
use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Download,
    Probe,
    EncodeAdaptive,
    EncodeRenditions,
    Thumbnail,
    Upload,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Download => "download",
            Stage::Probe => "probe",
            Stage::EncodeAdaptive => "encode_adaptive",
            Stage::EncodeRenditions => "encode_renditions",
            Stage::Thumbnail => "thumbnail",
            Stage::Upload => "upload",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("cancelled during {0}")]
    Cancelled(Stage),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Cancelled(stage) => Some(*stage),
            PipelineError::DeadlineExceeded(_) => None,
        }
    }
}

/// Scratch directory for one job. [`WorkingDir::remove`] deletes it without
/// blocking; dropping the guard without calling it falls back to a blocking
/// delete, which only happens when the run future itself is dropped.
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
    armed: bool,
}

impl WorkingDir {
    /// Create `<root>/<video_id>`, clearing anything a previous attempt left.
    pub async fn create(root: &Path, video_id: &str) -> io::Result<Self> {
        let path = root.join(video_id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => warn!(path = %path.display(), "removed stale working directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, armed: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "working directory removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove working directory"),
        }
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "working directory removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove working directory"),
        }
    }
}

/// Run one stage: refuse to start once cancelled, and race the work against
/// the token so a cancel interrupts it.
async fn run_stage<T, F>(
    stage: Stage,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, Box<dyn Error + Send + Sync>>>,
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled(stage));
    }
    debug!(%stage, "stage started");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled(stage)),
        result = work => result.map_err(|source| {
            if cancel.is_cancelled() {
                PipelineError::Cancelled(stage)
            } else {
                PipelineError::Stage { stage, source }
            }
        }),
    }
}

/// Drives one upload through download, encode, upload and publish.
pub struct PipelineCoordinator<A, E, P> {
    store: A,
    encoder: E,
    publisher: P,
    work_root: PathBuf,
}

impl<A, E, P> PipelineCoordinator<A, E, P>
where
    A: ArtifactStore,
    E: EncodeBackend,
    P: EventPublisher,
{
    pub fn new(store: A, encoder: E, publisher: P, work_root: PathBuf) -> Self {
        Self {
            store,
            encoder,
            publisher,
            work_root,
        }
    }

    pub async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.publisher.close().await
    }

    pub async fn run(
        &self,
        event: &UploadCompletedEvent,
        cancel: &CancellationToken,
    ) -> Result<TranscodeCompleteEvent, PipelineError> {
        let video_id = event.video_id.as_str();

        let workdir = run_stage(Stage::Prepare, cancel, async {
            WorkingDir::create(&self.work_root, video_id)
                .await
                .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
        })
        .await?;

        let result = self.process(event, &workdir, cancel).await;
        workdir.remove().await;
        result
    }

    async fn process(
        &self,
        event: &UploadCompletedEvent,
        workdir: &WorkingDir,
        cancel: &CancellationToken,
    ) -> Result<TranscodeCompleteEvent, PipelineError> {
        let video_id = event.video_id.as_str();

        let extension = event.source_extension();
        let source = workdir.path().join(format!("original{extension}"));
        run_stage(
            Stage::Download,
            cancel,
            self.store.download_source(video_id, extension, &source),
        )
        .await?;

        let ladder = self.ladder_for(event, &source, cancel).await?;
        info!(
            video_id,
            profiles = ?ladder.iter().map(|p| p.name).collect::<Vec<_>>(),
            "selected quality ladder"
        );

        let hls_dir = workdir.path().join("hls");
        run_stage(
            Stage::EncodeAdaptive,
            cancel,
            self.encoder
                .encode_adaptive(&source, &hls_dir, &ladder, cancel),
        )
        .await?;

        let mp4_dir = workdir.path().join("mp4");
        let renditions = run_stage(
            Stage::EncodeRenditions,
            cancel,
            self.encoder
                .encode_renditions(&source, &mp4_dir, &ladder, cancel),
        )
        .await?;

        let thumbnail = workdir.path().join("thumbnail.jpg");
        run_stage(
            Stage::Thumbnail,
            cancel,
            self.encoder.extract_thumbnail(&source, &thumbnail, cancel),
        )
        .await?;

        let hls_path = run_stage(
            Stage::Upload,
            cancel,
            self.store.upload_hls(video_id, &hls_dir),
        )
        .await?;
        let mp4_path = run_stage(
            Stage::Upload,
            cancel,
            self.store.upload_renditions(video_id, &renditions),
        )
        .await?;
        let thumbnail_path = run_stage(
            Stage::Upload,
            cancel,
            self.store.upload_thumbnail(video_id, &thumbnail),
        )
        .await?;

        let complete = TranscodeCompleteEvent::completed(
            event,
            hls_path,
            mp4_path,
            thumbnail_path,
            Utc::now(),
        );
        run_stage(
            Stage::Publish,
            cancel,
            self.publisher.publish_transcode_complete(&complete),
        )
        .await?;

        Ok(complete)
    }

    /// Ladder from the event's dimensions, probing the source when the
    /// upload service did not report them.
    async fn ladder_for(
        &self,
        event: &UploadCompletedEvent,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<QualityProfile>, PipelineError> {
        let meta = &event.source_metadata;
        if meta.width > 0 && meta.height > 0 {
            return Ok(select_ladder(meta.width, meta.height));
        }

        let raw = run_stage(Stage::Probe, cancel, self.encoder.probe(source, cancel)).await?;
        let (width, height) = ProbeReport::parse(&raw)
            .ok()
            .and_then(|report| report.video_dimensions())
            .unwrap_or_else(|| {
                warn!(video_id = %event.video_id, "no video dimensions, using floor ladder");
                (0, 0)
            });
        Ok(select_ladder(width, height))
    }
}
