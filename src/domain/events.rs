//! Wire events exchanged with the rest of the platform.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Published by the upload service once the original asset is in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCompletedEvent {
    pub video_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, rename = "size")]
    pub size_bytes: i64,
    #[serde(default, rename = "metadata")]
    pub source_metadata: SourceMetadata,
    #[serde(default)]
    pub uploaded_at: String,
}

/// Probe results the upload service extracted from the original file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub bitrate: i64,
    pub file_size: i64,
    pub checksum: String,
    pub created_at: String,
    pub codec: String,
    pub frame_rate: f64,
    pub aspect_ratio: String,
    pub audio_codec: String,
    pub audio_bitrate: i64,
    pub audio_channels: u32,
    pub content_type: String,
    pub original_filename: String,
    pub file_extension: String,
    pub sanitized_filename: String,
}

impl UploadCompletedEvent {
    /// Container extension of the stored original, derived from its MIME type.
    pub fn source_extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "video/webm" => ".webm",
            "video/quicktime" => ".mov",
            _ => ".mp4",
        }
    }

    /// The video id names a working directory and store keys, so it must be a
    /// single plain path component.
    pub fn has_valid_id(&self) -> bool {
        if self.video_id.is_empty() || self.video_id.contains(['/', '\\']) {
            return false;
        }
        let mut components = Path::new(&self.video_id).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeStatus {
    Completed,
}

/// Emitted once per successful job on the completion topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeCompleteEvent {
    pub video_id: String,
    pub user_id: String,
    pub title: String,
    pub hls_path: String,
    pub mp4_path: String,
    pub thumbnail_path: String,
    pub status: TranscodeStatus,
    pub completed_at: String,
}

impl TranscodeCompleteEvent {
    pub fn completed(
        source: &UploadCompletedEvent,
        hls_path: String,
        mp4_path: String,
        thumbnail_path: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id: source.video_id.clone(),
            user_id: source.user_id.clone(),
            title: source.title.clone(),
            hls_path,
            mp4_path,
            thumbnail_path,
            status: TranscodeStatus::Completed,
            completed_at: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
