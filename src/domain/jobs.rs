use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// An in-flight transcode, owned by the dispatcher's active table.
#[derive(Debug)]
pub struct TranscodeJob {
    pub video_id: String,
    pub started_at: DateTime<Utc>,
    pub cancel: CancellationToken,
}

impl TranscodeJob {
    pub fn new(video_id: String, cancel: CancellationToken) -> Self {
        Self {
            video_id,
            started_at: Utc::now(),
            cancel,
        }
    }
}

/// Read-only view of an active job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub video_id: String,
    pub started_at: DateTime<Utc>,
}

impl From<&TranscodeJob> for ActiveJob {
    fn from(job: &TranscodeJob) -> Self {
        Self {
            video_id: job.video_id.clone(),
            started_at: job.started_at,
        }
    }
}
