//! Command lines for ffmpeg and ffprobe.

use super::EncoderSettings;
use crate::domain::hls::MEDIA_PLAYLIST;
use crate::domain::ladder::QualityProfile;
use std::ffi::OsString;
use std::path::Path;

/// Lower and upper bound for the thumbnail seek position, in seconds.
const THUMBNAIL_SEEK_MIN: f64 = 0.1;
const THUMBNAIL_SEEK_MAX: f64 = 5.0;
const THUMBNAIL_WIDTH: u32 = 320;

fn push<I, S>(args: &mut Vec<OsString>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.extend(items.into_iter().map(Into::into));
}

/// Input, H.264/AAC encode and scaling options shared by both output kinds.
fn encode_args(settings: &EncoderSettings, source: &Path, profile: &QualityProfile) -> Vec<OsString> {
    let mut args = Vec::new();
    push(&mut args, ["-y", "-hide_banner", "-nostats", "-progress", "pipe:1", "-i"]);
    args.push(source.as_os_str().to_owned());
    push(
        &mut args,
        [
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            settings.preset.clone(),
            "-crf".to_string(),
            settings.crf.to_string(),
            "-maxrate".to_string(),
            format!("{}k", profile.video_bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", profile.video_bitrate_kbps * 2),
            "-vf".to_string(),
            format!("scale={}:{}", profile.width, profile.height),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", profile.audio_bitrate_kbps),
            "-ar".to_string(),
            "48000".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-threads".to_string(),
            settings.threads.to_string(),
        ],
    );
    args
}

/// One HLS media playlist with its segments inside `profile_dir`.
pub fn hls_args(
    settings: &EncoderSettings,
    source: &Path,
    profile: &QualityProfile,
    profile_dir: &Path,
) -> Vec<OsString> {
    let mut args = encode_args(settings, source, profile);
    push(
        &mut args,
        [
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            settings.segment_length.to_string(),
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_segment_filename".to_string(),
        ],
    );
    args.push(profile_dir.join("segment_%03d.ts").into_os_string());
    push(&mut args, ["-hls_flags", "independent_segments"]);
    args.push(profile_dir.join(MEDIA_PLAYLIST).into_os_string());
    args
}

/// Progressive MP4 with the moov atom up front.
pub fn mp4_args(
    settings: &EncoderSettings,
    source: &Path,
    profile: &QualityProfile,
    output: &Path,
) -> Vec<OsString> {
    let mut args = encode_args(settings, source, profile);
    push(&mut args, ["-movflags", "+faststart"]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Seek position for the poster frame: a tenth into the video, clamped.
/// Unknown durations seek to the lower bound.
pub fn thumbnail_seek(duration_seconds: Option<f64>) -> f64 {
    match duration_seconds {
        Some(d) => (d * 0.1).clamp(THUMBNAIL_SEEK_MIN, THUMBNAIL_SEEK_MAX),
        None => THUMBNAIL_SEEK_MIN,
    }
}

pub fn thumbnail_args(source: &Path, output: &Path, seek_seconds: f64) -> Vec<OsString> {
    let mut args = Vec::new();
    push(
        &mut args,
        [
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-ss".to_string(),
            format!("{:.3}", seek_seconds),
            "-i".to_string(),
        ],
    );
    args.push(source.as_os_str().to_owned());
    push(
        &mut args,
        [
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-1,format=yuv420p", THUMBNAIL_WIDTH),
            "-q:v".to_string(),
            "2".to_string(),
        ],
    );
    args.push(output.as_os_str().to_owned());
    args
}

pub fn probe_args(source: &Path) -> Vec<OsString> {
    let mut args = Vec::new();
    push(
        &mut args,
        ["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"],
    );
    args.push(source.as_os_str().to_owned());
    args
}
