#![allow(clippy::collapsible_if, clippy::redundant_closure)]
pub mod engine;
pub mod ffprobe;
pub mod ingest;
pub mod manifest;
pub mod planner;
pub mod runner;
pub mod status;
pub mod sweeper;
pub mod thumbs;
pub mod watermark;

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline failure taxonomy. `is_fatal` decides whether a step failure
/// takes the whole asset down or only degrades the output.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no decodable video stream: {0}")]
    UnreadableMedia(String),
    #[error("rendition encode failed ({tier}): {reason}")]
    RenditionEncode { tier: String, reason: String },
    #[error("thumbnail generation failed: {0}")]
    ThumbnailGeneration(String),
    #[error("preview generation failed: {0}")]
    PreviewGeneration(String),
    #[error("manifest write failed: {0}")]
    ManifestWrite(String),
    #[error("storage i/o error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("cancelled by operator")]
    Cancelled,
}

impl PipelineError {
    /// Missing thumbnails or a missing preview degrade gracefully; everything
    /// else terminates the asset in `failed`.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ThumbnailGeneration(_) | Self::PreviewGeneration(_)
        )
    }
}

/// Global pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Still frames per asset.
    pub thumbnail_count: u32,
    /// Preview clip ceiling; actual length is min of this and the duration.
    pub preview_max_secs: f64,
    /// Wall-clock ceiling per rendition encode.
    pub encode_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            thumbnail_count: 5,
            preview_max_secs: 30.0,
            encode_timeout_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_follows_policy() {
        assert!(PipelineError::UnreadableMedia("x".into()).is_fatal());
        assert!(
            PipelineError::RenditionEncode {
                tier: "720p".into(),
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(PipelineError::ManifestWrite("x".into()).is_fatal());
        assert!(PipelineError::Cancelled.is_fatal());
        assert!(!PipelineError::ThumbnailGeneration("x".into()).is_fatal());
        assert!(!PipelineError::PreviewGeneration("x".into()).is_fatal());
    }

    #[test]
    fn cancelled_message_names_the_operator() {
        assert_eq!(PipelineError::Cancelled.to_string(), "cancelled by operator");
    }
}
