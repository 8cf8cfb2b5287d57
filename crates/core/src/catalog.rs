/// A named quality tier: fixed resolution, bitrate ceilings, and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub fps: u32,
}

/// The quality catalog, ordered highest → lowest. Shared by the rendition
/// planner and the manifest builder so the two can never drift apart.
pub const QUALITY_CATALOG: [QualityProfile; 4] = [
    QualityProfile {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_kbps: 5000,
        audio_kbps: 192,
        fps: 30,
    },
    QualityProfile {
        name: "720p",
        width: 1280,
        height: 720,
        video_kbps: 2800,
        audio_kbps: 128,
        fps: 30,
    },
    QualityProfile {
        name: "480p",
        width: 854,
        height: 480,
        video_kbps: 1400,
        audio_kbps: 128,
        fps: 30,
    },
    QualityProfile {
        name: "360p",
        width: 640,
        height: 360,
        video_kbps: 800,
        audio_kbps: 96,
        fps: 30,
    },
];

/// Tier name used when no catalog tier fits and the planner synthesizes a
/// rendition at the source's own resolution.
pub const NATIVE_TIER: &str = "native";

pub fn profile_by_name(name: &str) -> Option<&'static QualityProfile> {
    QUALITY_CATALOG.iter().find(|p| p.name == name)
}

/// The lowest tier in the catalog. Bitrate source for the native tier and
/// for previews when no catalog tier qualified.
pub fn lowest() -> &'static QualityProfile {
    &QUALITY_CATALOG[QUALITY_CATALOG.len() - 1]
}
