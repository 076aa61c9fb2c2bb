//! Object key layout shared by every artifact store.

use std::path::Path;

/// Prefixes that namespace the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreLayout {
    pub original_prefix: String,
    pub hls_prefix: String,
    pub mp4_prefix: String,
    pub thumbnail_prefix: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            original_prefix: "original".to_string(),
            hls_prefix: "hls".to_string(),
            mp4_prefix: "mp4".to_string(),
            thumbnail_prefix: "thumbnails".to_string(),
        }
    }
}

impl StoreLayout {
    pub fn source_key(&self, video_id: &str, extension: &str) -> String {
        format!("{}/{}{}", self.original_prefix, video_id, extension)
    }

    /// Directory that holds the master manifest and one folder per profile.
    pub fn hls_dir(&self, video_id: &str) -> String {
        format!("{}/{}", self.hls_prefix, video_id)
    }

    /// `relative` is a path inside the local adaptive output tree.
    pub fn hls_key(&self, video_id: &str, relative: &Path) -> String {
        format!("{}/{}", self.hls_dir(video_id), to_key(relative))
    }

    pub fn mp4_dir(&self, video_id: &str) -> String {
        format!("{}/{}", self.mp4_prefix, video_id)
    }

    pub fn mp4_key(&self, video_id: &str, file_name: &str) -> String {
        format!("{}/{}", self.mp4_dir(video_id), file_name)
    }

    pub fn thumbnail_key(&self, video_id: &str) -> String {
        format!("{}/{}.jpg", self.thumbnail_prefix, video_id)
    }
}

/// Forward-slash key for a relative local path.
fn to_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Content type stored alongside an uploaded artifact.
pub fn content_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/mp2t".to_string(),
        Some("m4s") | Some("mp4") => "video/mp4".to_string(),
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    }
}
