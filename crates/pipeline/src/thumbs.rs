//! Thumbnail stills and the short preview clip. Both steps are non-critical:
//! their failures are logged and the asset still completes.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{EncodeSpec, MediaEngine};
use crate::planner::RenditionJob;
use crate::PipelineError;

pub const PREVIEW_FILENAME: &str = "preview.mp4";

/// Extract `count` stills at midpoint offsets spanning the duration, named
/// `thumb-001.jpg` … so any one is addressable without a directory listing.
/// A zero or unknown duration skips the step entirely.
pub async fn generate_thumbnails(
    engine: &dyn MediaEngine,
    source: &Path,
    duration_secs: f64,
    count: u32,
    output_dir: &Path,
) -> Result<Vec<String>, PipelineError> {
    if duration_secs <= 0.0 || count == 0 {
        debug!(duration_secs, "skipping thumbnails");
        return Ok(Vec::new());
    }

    let mut paths = Vec::with_capacity(count as usize);
    for i in 0..count {
        let at = (i as f64 + 0.5) * duration_secs / count as f64;
        let output = output_dir.join(format!("thumb-{:03}.jpg", i + 1));
        engine.extract_frame(source, at, &output).await?;
        paths.push(output.to_string_lossy().into_owned());
    }
    Ok(paths)
}

/// Encode one preview clip: min(max_secs, duration) seconds from t=0, at the
/// lowest planned rendition's profile. Skipped (Ok(None)) when the duration
/// is zero or unknown.
pub async fn generate_preview(
    engine: &dyn MediaEngine,
    source: &Path,
    duration_secs: f64,
    max_secs: f64,
    lowest: &RenditionJob,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Option<String>, PipelineError> {
    if duration_secs <= 0.0 {
        debug!(duration_secs, "skipping preview");
        return Ok(None);
    }

    let output = output_dir.join(PREVIEW_FILENAME);
    let spec = EncodeSpec {
        input: source.to_path_buf(),
        output: output.clone(),
        label: "preview".into(),
        width: lowest.width,
        height: lowest.height,
        video_kbps: lowest.video_kbps,
        audio_kbps: lowest.audio_kbps,
        fps: lowest.fps,
        clip_secs: Some(duration_secs.min(max_secs)),
        watermark: None,
    };

    engine.encode(&spec, cancel).await.map_err(|e| match e {
        PipelineError::Cancelled => PipelineError::Cancelled,
        other => PipelineError::PreviewGeneration(other.to_string()),
    })?;

    Ok(Some(output.to_string_lossy().into_owned()))
}
