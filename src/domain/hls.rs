use super::ladder::QualityProfile;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// File name of the top-level manifest inside an adaptive output tree.
pub const MASTER_PLAYLIST: &str = "master.m3u8";
/// File name of each profile's media playlist, relative to its directory.
pub const MEDIA_PLAYLIST: &str = "playlist.m3u8";

pub struct VariantStream {
    pub bandwidth: u64,
    pub resolution: String,
    pub uri: String,
}

/// Top-level playlist pointing at one media playlist per rendition.
pub struct MasterPlaylist {
    pub version: u8,
    pub variants: Vec<VariantStream>,
}

impl MasterPlaylist {
    pub fn new() -> Self {
        Self {
            version: 3,
            variants: Vec::new(),
        }
    }

    /// Master playlist for a ladder whose renditions live in
    /// `<profile>/playlist.m3u8`.
    pub fn for_ladder(ladder: &[QualityProfile]) -> Self {
        let mut playlist = Self::new();
        for profile in ladder {
            playlist.add_profile(profile);
        }
        playlist
    }

    pub fn add_profile(&mut self, profile: &QualityProfile) {
        self.variants.push(VariantStream {
            bandwidth: profile.bandwidth(),
            resolution: profile.resolution(),
            uri: format!("{}/{}", profile.name, MEDIA_PLAYLIST),
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        out.push_str(&format!("#EXT-X-VERSION:{}\n", self.version));
        for variant in &self.variants {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n",
                variant.bandwidth, variant.resolution
            ));
            out.push_str(&variant.uri);
            out.push('\n');
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let mut file = File::create(path).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::select_ladder;
    use tokio::fs;

    #[tokio::test]
    async fn test_master_playlist_lists_every_profile() {
        let playlist = MasterPlaylist::for_ladder(&select_ladder(1280, 720));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MASTER_PLAYLIST);
        playlist.write_to(&path).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(content.contains("#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n720p/playlist.m3u8\n"));
        assert!(content.contains("#EXT-X-STREAM-INF:BANDWIDTH=400000,RESOLUTION=426x240\n240p/playlist.m3u8\n"));
        assert_eq!(content.matches("#EXT-X-STREAM-INF").count(), 4);
    }

    #[test]
    fn test_variants_keep_ladder_order() {
        let playlist = MasterPlaylist::for_ladder(&select_ladder(1920, 1080));
        let uris: Vec<_> = playlist.variants.iter().map(|v| v.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "1080p/playlist.m3u8",
                "720p/playlist.m3u8",
                "480p/playlist.m3u8",
                "360p/playlist.m3u8",
                "240p/playlist.m3u8"
            ]
        );
    }

    #[test]
    fn test_floor_ladder_is_rendered_highest_first() {
        let content = MasterPlaylist::for_ladder(&select_ladder(500, 300)).render();
        let at_360 = content
            .find("BANDWIDTH=800000,RESOLUTION=640x360")
            .unwrap();
        let at_240 = content
            .find("BANDWIDTH=400000,RESOLUTION=426x240")
            .unwrap();
        assert!(at_360 < at_240, "{content}");
    }
}
