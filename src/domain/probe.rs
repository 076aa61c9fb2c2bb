//! Subset of the `ffprobe -print_format json` report that the pipeline reads.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeFormat {
    // ffprobe prints numbers as strings here
    pub duration: Option<String>,
}

impl ProbeReport {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Dimensions of the first video stream.
    pub fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.streams
            .iter()
            .filter(|s| s.codec_type == "video")
            .find_map(|s| match (s.width, s.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
                _ => None,
            })
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "aac"},
            {"index": 1, "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
        ],
        "format": {"filename": "original.mp4", "duration": "42.250000"}
    }"#;

    #[test]
    fn test_reads_dimensions_and_duration() {
        let report = ProbeReport::parse(REPORT).unwrap();
        assert_eq!(report.video_dimensions(), Some((1280, 720)));
        assert_eq!(report.duration_seconds(), Some(42.25));
    }

    #[test]
    fn test_audio_only_source_has_no_dimensions() {
        let report = ProbeReport::parse(
            r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"N/A"}}"#,
        )
        .unwrap();
        assert_eq!(report.video_dimensions(), None);
        assert_eq!(report.duration_seconds(), None);
    }
}
