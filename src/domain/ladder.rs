//! Output quality ladder.
//!
//! The catalog is ordered from the highest to the lowest resolution and every
//! ladder handed out by [`select_ladder`] preserves that order.

use serde::Serialize;

/// A single target encode profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl QualityProfile {
    /// Peak bandwidth advertised in the master manifest, in bits per second.
    pub fn bandwidth(&self) -> u64 {
        u64::from(self.video_bitrate_kbps) * 1000
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

pub const UHD_4K: QualityProfile = QualityProfile {
    name: "4k",
    width: 3840,
    height: 2160,
    video_bitrate_kbps: 15000,
    audio_bitrate_kbps: 192,
};

pub const FHD_1080P: QualityProfile = QualityProfile {
    name: "1080p",
    width: 1920,
    height: 1080,
    video_bitrate_kbps: 5000,
    audio_bitrate_kbps: 192,
};

pub const HD_720P: QualityProfile = QualityProfile {
    name: "720p",
    width: 1280,
    height: 720,
    video_bitrate_kbps: 2800,
    audio_bitrate_kbps: 128,
};

pub const SD_480P: QualityProfile = QualityProfile {
    name: "480p",
    width: 854,
    height: 480,
    video_bitrate_kbps: 1400,
    audio_bitrate_kbps: 128,
};

pub const LD_360P: QualityProfile = QualityProfile {
    name: "360p",
    width: 640,
    height: 360,
    video_bitrate_kbps: 800,
    audio_bitrate_kbps: 96,
};

pub const LD_240P: QualityProfile = QualityProfile {
    name: "240p",
    width: 426,
    height: 240,
    video_bitrate_kbps: 400,
    audio_bitrate_kbps: 64,
};

/// Every profile the service can produce, highest resolution first.
pub const CATALOG: [QualityProfile; 6] = [UHD_4K, FHD_1080P, HD_720P, SD_480P, LD_360P, LD_240P];

/// Appended when the input is too small to retain two catalog entries.
const FLOOR: [QualityProfile; 2] = [LD_360P, LD_240P];

/// Minimum number of renditions every job produces.
pub const MIN_LADDER_LEN: usize = 2;

/// Picks the renditions to produce for an input of `width` x `height`.
///
/// A profile is kept when it fits inside the input on both axes. The
/// comparison is orientation-sensitive: a portrait input is measured against
/// landscape profiles, so a tall narrow source keeps fewer rungs than its pixel
/// count would suggest. When fewer than two profiles survive, the 360p/240p
/// floor is added, in catalog order, even if it upscales the source.
pub fn select_ladder(width: u32, height: u32) -> Vec<QualityProfile> {
    let fits = |profile: &QualityProfile| profile.width <= width && profile.height <= height;
    let use_floor = CATALOG.iter().filter(|profile| fits(profile)).count() < MIN_LADDER_LEN;

    // one pass over the catalog keeps the ladder highest first
    CATALOG
        .iter()
        .filter(|profile| fits(profile) || (use_floor && FLOOR.contains(profile)))
        .copied()
        .collect()
}
