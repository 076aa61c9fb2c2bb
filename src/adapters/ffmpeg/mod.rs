//! EncodeBackend backed by the ffmpeg and ffprobe executables.

mod args;
mod process;

use crate::domain::hls::{MasterPlaylist, MASTER_PLAYLIST};
use crate::domain::ladder::QualityProfile;
use crate::domain::probe::ProbeReport;
use crate::ports::encoder::EncodeBackend;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("child process pipes unavailable")]
    MissingPipe,
    #[error("encode cancelled")]
    Cancelled,
    #[error("empty quality ladder")]
    EmptyLadder,
    #[error("encoder produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub threads: u32,
    pub preset: String,
    pub crf: u8,
    /// Target HLS segment duration in seconds.
    pub segment_length: u32,
    /// When set, each encoder run appends its command and stderr tail here.
    pub log_dir: Option<PathBuf>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            threads: 4,
            preset: "medium".to_string(),
            crf: 23,
            segment_length: 10,
            log_dir: None,
        }
    }
}

pub struct FfmpegBackend {
    settings: EncoderSettings,
}

impl FfmpegBackend {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    fn log_file(&self, source: &Path) -> Option<PathBuf> {
        self.settings
            .log_dir
            .as_deref()
            .map(|dir| process::log_path(dir, source))
    }

    async fn ffmpeg(
        &self,
        args: Vec<std::ffi::OsString>,
        label: &str,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), EncodeError> {
        process::run_encoder(
            &self.settings.ffmpeg_path,
            args,
            label,
            cancel,
            self.log_file(source),
        )
        .await
    }
}

#[async_trait]
impl EncodeBackend for FfmpegBackend {
    #[instrument(skip_all, fields(source = %source.display()))]
    async fn encode_adaptive(
        &self,
        source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        if ladder.is_empty() {
            return Err(EncodeError::EmptyLadder.into());
        }
        tokio::fs::create_dir_all(out_dir).await?;

        for profile in ladder {
            let profile_dir = out_dir.join(profile.name);
            tokio::fs::create_dir_all(&profile_dir).await?;
            let args = args::hls_args(&self.settings, source, profile, &profile_dir);
            self.ffmpeg(args, &format!("{} hls", profile.name), source, cancel)
                .await?;
            info!(profile = profile.name, "adaptive rendition ready");
        }

        let master = out_dir.join(MASTER_PLAYLIST);
        MasterPlaylist::for_ladder(ladder).write_to(&master).await?;
        Ok(master)
    }

    #[instrument(skip_all, fields(source = %source.display()))]
    async fn encode_renditions(
        &self,
        source: &Path,
        out_dir: &Path,
        ladder: &[QualityProfile],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, Box<dyn Error + Send + Sync>> {
        if ladder.is_empty() {
            return Err(EncodeError::EmptyLadder.into());
        }
        tokio::fs::create_dir_all(out_dir).await?;

        let mut outputs = Vec::with_capacity(ladder.len());
        for profile in ladder {
            let output = out_dir.join(format!("{}.mp4", profile.name));
            let args = args::mp4_args(&self.settings, source, profile, &output);
            self.ffmpeg(args, &format!("{} mp4", profile.name), source, cancel)
                .await?;
            info!(profile = profile.name, "mp4 rendition ready");
            outputs.push(output);
        }
        Ok(outputs)
    }

    async fn extract_thumbnail(
        &self,
        source: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let duration = match self.probe(source, cancel).await {
            Ok(raw) => ProbeReport::parse(&raw)
                .ok()
                .and_then(|report| report.duration_seconds()),
            Err(_) if cancel.is_cancelled() => return Err(EncodeError::Cancelled.into()),
            Err(e) => {
                warn!(error = %e, "probe failed, thumbnail taken near the start");
                None
            }
        };
        let seek = args::thumbnail_seek(duration);

        let args = args::thumbnail_args(source, output, seek);
        self.ffmpeg(args, "thumbnail", source, cancel).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(EncodeError::MissingOutput(output.to_path_buf()).into());
        }
        Ok(())
    }

    async fn probe(
        &self,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let raw = process::capture(
            &self.settings.ffprobe_path,
            args::probe_args(source),
            cancel,
        )
        .await?;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::select_ladder;

    fn backend() -> FfmpegBackend {
        FfmpegBackend::new(EncoderSettings {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            ..EncoderSettings::default()
        })
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_spawning() {
        let work = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = backend()
            .encode_adaptive(
                &work.path().join("original.mp4"),
                &work.path().join("hls"),
                &select_ladder(1280, 720),
                &cancel,
            )
            .await
            .unwrap_err();
        let err = err.downcast::<EncodeError>().unwrap();
        assert!(matches!(*err, EncodeError::Cancelled));
        assert!(!work.path().join("hls").join(MASTER_PLAYLIST).exists());
    }

    #[tokio::test]
    async fn test_empty_ladder_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let err = backend()
            .encode_renditions(&work.path().join("original.mp4"), work.path(), &[], &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty quality ladder"));
    }

    #[tokio::test]
    async fn test_thumbnail_survives_probe_failure_but_not_encoder_failure() {
        let work = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let err = backend()
            .extract_thumbnail(
                &work.path().join("original.mp4"),
                &work.path().join("thumbnail.jpg"),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ffmpeg"));
    }

    #[test]
    fn test_log_file_only_when_configured() {
        let source = Path::new("/tmp/transcoder/v9/original.mp4");
        assert!(backend().log_file(source).is_none());

        let with_logs = FfmpegBackend::new(EncoderSettings {
            log_dir: Some(PathBuf::from("/var/log/transcoder")),
            ..EncoderSettings::default()
        });
        let path = with_logs.log_file(source).unwrap();
        assert!(path.starts_with("/var/log/transcoder"));
    }
}
