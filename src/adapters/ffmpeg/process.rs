//! Child process execution with cancellation, progress and stderr capture.

use super::EncodeError;
use chrono::Utc;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, PartialEq)]
pub(super) enum Progress {
    Position(Duration),
    End,
}

/// Parse one `key=value` line of `-progress` output.
pub(super) fn parse_progress(line: &str) -> Option<Progress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // despite the name, ffmpeg reports microseconds here
        "out_time_ms" | "out_time_us" => value
            .parse::<u64>()
            .ok()
            .map(|us| Progress::Position(Duration::from_micros(us))),
        "progress" if value == "end" => Some(Progress::End),
        _ => None,
    }
}

async fn log_progress<R>(stdout: R, label: String)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_progress(&line) {
            // one line per whole second of output
            Some(Progress::Position(at)) if last != Some(at.as_secs()) => {
                last = Some(at.as_secs());
                debug!(task = %label, position = ?at, "encode progress");
            }
            Some(Progress::End) => debug!(task = %label, "encode finished"),
            _ => {}
        }
    }
}

async fn collect_tail<R>(stderr: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

/// `<log_dir>/ffmpeg_<id>_<timestamp>.log`, where the id is the name of the
/// directory holding the source (the job's working directory).
pub(super) fn log_path(log_dir: &Path, source: &Path) -> PathBuf {
    let id = source
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    log_dir.join(format!(
        "ffmpeg_{}_{}.log",
        id,
        Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

async fn append_log(path: &Path, program: &Path, args: &[OsString], stderr: &[String]) {
    let mut entry = format!("$ {}", program.display());
    for arg in args {
        entry.push(' ');
        entry.push_str(&arg.to_string_lossy());
    }
    entry.push('\n');
    for line in stderr {
        entry.push_str(line);
        entry.push('\n');
    }

    let result = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(entry.as_bytes()).await
    }
    .await;

    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to write encoder log");
    }
}

/// Run an encoder to completion. The child is killed when `cancel` fires or
/// when this future is dropped.
pub(super) async fn run_encoder(
    program: &Path,
    args: Vec<OsString>,
    label: &str,
    cancel: &CancellationToken,
    log_file: Option<PathBuf>,
) -> Result<(), EncodeError> {
    if cancel.is_cancelled() {
        return Err(EncodeError::Cancelled);
    }

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EncodeError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or(EncodeError::MissingPipe)?;
    let stderr = child.stderr.take().ok_or(EncodeError::MissingPipe)?;
    let progress = tokio::spawn(log_progress(stdout, label.to_string()));
    let tail = tokio::spawn(collect_tail(stderr));

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            progress.abort();
            tail.abort();
            return Err(EncodeError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let _ = progress.await;
    let stderr_tail = tail.await.unwrap_or_default();

    if let Some(path) = log_file {
        append_log(&path, program, &args, &stderr_tail).await;
    }

    if !status.success() {
        return Err(EncodeError::Failed {
            program: program.display().to_string(),
            status: status.to_string(),
            stderr: stderr_tail.join("\n"),
        });
    }
    Ok(())
}

/// Run a short-lived command and return its stdout.
pub(super) async fn capture(
    program: &Path,
    args: Vec<OsString>,
    cancel: &CancellationToken,
) -> Result<String, EncodeError> {
    if cancel.is_cancelled() {
        return Err(EncodeError::Cancelled);
    }

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EncodeError::Cancelled),
        output = output => output.map_err(|source| EncodeError::Spawn {
            program: program.display().to_string(),
            source,
        })?,
    };

    if !output.status.success() {
        return Err(EncodeError::Failed {
            program: program.display().to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn test_parses_progress_lines() {
        assert_eq!(
            parse_progress("out_time_ms=2500000"),
            Some(Progress::Position(Duration::from_millis(2500)))
        );
        assert_eq!(parse_progress("progress=end"), Some(Progress::End));
        assert_eq!(parse_progress("progress=continue"), None);
        assert_eq!(parse_progress("fps=24.0"), None);
        assert_eq!(parse_progress("out_time_ms=N/A"), None);
        assert_eq!(parse_progress("garbage"), None);
    }

    #[tokio::test]
    async fn test_tail_keeps_last_lines() {
        let input: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = collect_tail(input.as_bytes()).await;
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.first().unwrap(), "line 30");
        assert_eq!(tail.last().unwrap(), "line 49");
    }

    #[test]
    fn test_log_path_uses_working_dir_name() {
        let path = log_path(Path::new("/var/log/tx"), Path::new("/tmp/transcoder/v42/original.mp4"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ffmpeg_v42_"));
        assert!(name.ends_with(".log"));
        assert_eq!(path.parent().unwrap(), Path::new("/var/log/tx"));
    }

    #[tokio::test]
    async fn test_failed_process_reports_stderr_tail() {
        let cancel = CancellationToken::new();
        let err = run_encoder(
            Path::new("sh"),
            sh("echo broken input >&2; exit 3"),
            "test",
            &cancel,
            None,
        )
        .await
        .unwrap_err();

        match err {
            EncodeError::Failed { stderr, .. } => assert_eq!(stderr, "broken input"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_process_is_logged_when_configured() {
        let logs = tempfile::tempdir().unwrap();
        let log_file = logs.path().join("ffmpeg_v1_test.log");
        let cancel = CancellationToken::new();

        let _ = run_encoder(
            Path::new("sh"),
            sh("echo unsupported codec >&2; exit 1"),
            "test",
            &cancel,
            Some(log_file.clone()),
        )
        .await;

        let content = tokio::fs::read_to_string(&log_file).await.unwrap();
        assert!(content.starts_with("$ sh -c"));
        assert!(content.contains("unsupported codec"));
    }

    #[tokio::test]
    async fn test_cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = run_encoder(Path::new("sleep"), vec!["30".into()], "test", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_capture_returns_stdout() {
        let cancel = CancellationToken::new();
        let out = capture(Path::new("sh"), sh("printf '{\"streams\":[]}'"), &cancel)
            .await
            .unwrap();
        assert_eq!(out, r#"{"streams":[]}"#);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let cancel = CancellationToken::new();
        let err = capture(Path::new("/nonexistent/ffprobe"), vec![], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::Spawn { .. }));
    }
}
