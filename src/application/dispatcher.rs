use super::pipeline::{PipelineCoordinator, PipelineError};
use crate::domain::events::UploadCompletedEvent;
use crate::domain::jobs::{ActiveJob, TranscodeJob};
use crate::ports::encoder::EncodeBackend;
use crate::ports::events::EventPublisher;
use crate::ports::storage::ArtifactStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    #[error("video {0} is already being transcoded")]
    Duplicate(String),
    #[error("all {0} job slots are busy")]
    CapacityExceeded(usize),
    #[error("invalid video id {0:?}")]
    InvalidEvent(String),
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Accepts upload events for transcoding.
#[cfg_attr(test, mockall::automock)]
pub trait JobAdmission: Send + Sync {
    fn admit(&self, event: UploadCompletedEvent) -> Result<(), AdmitError>;
}

#[derive(Clone, Debug)]
pub struct DispatcherSettings {
    pub max_concurrent_jobs: usize,
    pub job_timeout: Duration,
}

type ActiveTable = Arc<Mutex<HashMap<String, TranscodeJob>>>;

fn lock(table: &ActiveTable) -> MutexGuard<'_, HashMap<String, TranscodeJob>> {
    // the table stays consistent even if a holder panicked
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes a job from the active table and cancels its token when the job
/// task ends, however it ends.
struct Release {
    table: ActiveTable,
    video_id: String,
}

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(job) = lock(&self.table).remove(&self.video_id) {
            job.cancel.cancel();
        }
    }
}

/// Bounded, deduplicating scheduler of pipeline runs.
pub struct JobDispatcher<A, E, P> {
    pipeline: Arc<PipelineCoordinator<A, E, P>>,
    active: ActiveTable,
    tracker: TaskTracker,
    root: CancellationToken,
    settings: DispatcherSettings,
}

impl<A, E, P> JobDispatcher<A, E, P>
where
    A: ArtifactStore + 'static,
    E: EncodeBackend + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        pipeline: PipelineCoordinator<A, E, P>,
        settings: DispatcherSettings,
        root: CancellationToken,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            active: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
            root,
            settings,
        }
    }

    pub fn is_active(&self, video_id: &str) -> bool {
        lock(&self.active).contains_key(video_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Snapshot of running jobs, oldest first.
    pub fn active_jobs(&self) -> Vec<ActiveJob> {
        let mut jobs: Vec<ActiveJob> = lock(&self.active).values().map(ActiveJob::from).collect();
        jobs.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.video_id.cmp(&b.video_id))
        });
        jobs
    }

    fn spawn_job(&self, event: UploadCompletedEvent, cancel: CancellationToken) {
        let pipeline = self.pipeline.clone();
        let release = Release {
            table: self.active.clone(),
            video_id: event.video_id.clone(),
        };
        let timeout = self.settings.job_timeout;

        self.tracker.spawn(async move {
            let _release = release;
            let video_id = event.video_id.clone();
            let started = Instant::now();

            let result = tokio::select! {
                result = pipeline.run(&event, &cancel) => result,
                _ = tokio::time::sleep(timeout) => {
                    cancel.cancel();
                    Err(PipelineError::DeadlineExceeded(timeout))
                }
            };

            match result {
                Ok(done) => info!(
                    video_id = %video_id,
                    elapsed = ?started.elapsed(),
                    hls_path = %done.hls_path,
                    "transcode completed"
                ),
                Err(e) => error!(
                    video_id = %video_id,
                    stage = ?e.stage(),
                    elapsed = ?started.elapsed(),
                    error = %e,
                    "transcode failed"
                ),
            }
        });
    }

    /// Cancel every running job, wait for their tasks to finish, then close
    /// the pipeline's adapters.
    pub async fn shutdown(&self) {
        info!(active = self.active_count(), "stopping job dispatcher");
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        if let Err(e) = self.pipeline.close().await {
            warn!(error = %e, "failed to close publisher");
        }
        info!("job dispatcher stopped");
    }
}

impl<A, E, P> JobAdmission for JobDispatcher<A, E, P>
where
    A: ArtifactStore + 'static,
    E: EncodeBackend + 'static,
    P: EventPublisher + 'static,
{
    /// Register the job and start its pipeline, or say why not. Never blocks
    /// on I/O.
    fn admit(&self, event: UploadCompletedEvent) -> Result<(), AdmitError> {
        if !event.has_valid_id() {
            return Err(AdmitError::InvalidEvent(event.video_id));
        }
        if self.root.is_cancelled() {
            return Err(AdmitError::ShuttingDown);
        }

        let cancel = {
            let mut active = lock(&self.active);
            if active.contains_key(&event.video_id) {
                return Err(AdmitError::Duplicate(event.video_id));
            }
            if active.len() >= self.settings.max_concurrent_jobs {
                return Err(AdmitError::CapacityExceeded(self.settings.max_concurrent_jobs));
            }
            let cancel = self.root.child_token();
            active.insert(
                event.video_id.clone(),
                TranscodeJob::new(event.video_id.clone(), cancel.clone()),
            );
            cancel
        };

        info!(video_id = %event.video_id, active = self.active_count(), "job admitted");
        self.spawn_job(event, cancel);
        Ok(())
    }
}
