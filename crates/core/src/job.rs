use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The contract handed over by the job queue: which asset to process, where
/// the source bytes live, where artifacts go, and per-job options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub asset_id: String,
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub options: JobOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default = "default_enabled")]
    pub generate_thumbnails: bool,
    #[serde(default = "default_enabled")]
    pub create_preview: bool,
    #[serde(default = "default_enabled")]
    pub adaptive_bitrate: bool,
    /// Restrict the catalog to these tier names. `None` means the full catalog.
    #[serde(default)]
    pub quality_profiles: Option<Vec<String>>,
    #[serde(default)]
    pub watermark: Option<WatermarkSpec>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            generate_thumbnails: true,
            create_preview: true,
            adaptive_bitrate: true,
            quality_profiles: None,
            watermark: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Watermark applied identically to every rendition of an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatermarkSpec {
    /// Image overlay composited onto the video.
    Image {
        path: PathBuf,
        position: WatermarkPosition,
    },
    /// Semi-transparent text drawn over the video.
    Text {
        text: String,
        position: WatermarkPosition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}
