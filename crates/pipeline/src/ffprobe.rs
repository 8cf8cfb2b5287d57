use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Structural metadata of a source file, extracted via ffprobe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: Option<u32>,
    pub fps: Option<f64>,
    pub codec: String,
}

/// Run ffprobe on a file and parse the JSON output. Any failure here is
/// fatal: without a decodable video stream no encode is attempted.
pub async fn probe(ffprobe_path: &Path, file: &Path) -> Result<SourceInfo, PipelineError> {
    let output = tokio::process::Command::new(ffprobe_path)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(file)
        .output()
        .await
        .map_err(|e| PipelineError::UnreadableMedia(format!("ffprobe spawn failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::UnreadableMedia(format!(
            "ffprobe failed on {}: {stderr}",
            file.display()
        )));
    }

    let raw: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| PipelineError::UnreadableMedia(format!("ffprobe JSON parse: {e}")))?;

    parse_probe_output(&raw)
}

fn parse_probe_output(raw: &serde_json::Value) -> Result<SourceInfo, PipelineError> {
    let format = raw
        .get("format")
        .ok_or_else(|| PipelineError::UnreadableMedia("missing 'format'".into()))?;

    let duration_secs: f64 = format
        .get("duration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let container_bitrate: Option<u32> = format
        .get("bit_rate")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .map(|b| (b / 1000) as u32);

    let streams = raw
        .get("streams")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    // First video stream wins; sources with none are unusable here.
    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"))
        .ok_or_else(|| PipelineError::UnreadableMedia("no video stream".into()))?;

    let width = video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(PipelineError::UnreadableMedia(
            "video stream has no dimensions".into(),
        ));
    }

    let codec = video
        .get("codec_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let stream_bitrate = video
        .get("bit_rate")
        .and_then(|v| v.as_str())
        .and_then(|b| b.parse::<u64>().ok())
        .map(|b| (b / 1000) as u32);

    let fps = video
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .and_then(|fr| parse_fraction(fr));

    Ok(SourceInfo {
        duration_secs,
        width,
        height,
        bitrate_kbps: stream_bitrate.or(container_bitrate),
        fps,
        codec,
    })
}

fn parse_fraction(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d > 0.0 { Some(n / d) } else { None }
    } else {
        s.parse().ok()
    }
}
