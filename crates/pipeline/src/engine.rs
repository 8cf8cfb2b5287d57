use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use coursecast_core::job::WatermarkSpec;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ffprobe::{self, SourceInfo};
use crate::watermark;
use crate::PipelineError;

/// Declarative instruction set for one encode: resolution, bitrate ceilings,
/// frame rate, optional clip length and watermark.
#[derive(Debug, Clone)]
pub struct EncodeSpec {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Tier name for renditions, "preview" for the preview clip. Used in
    /// error messages only.
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub fps: u32,
    /// Encode only the first N seconds of the source.
    pub clip_secs: Option<f64>,
    pub watermark: Option<WatermarkSpec>,
}

/// The external media-encoding capability. The pipeline talks to this trait
/// only, so tests can substitute a deterministic engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn probe(&self, source: &Path) -> Result<SourceInfo, PipelineError>;

    /// Run one encode to completion. Must overwrite an existing output file,
    /// honor the cancellation token mid-run, and discard partial output when
    /// cancelled.
    async fn encode(
        &self,
        spec: &EncodeSpec,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError>;

    /// Extract a single still frame at `at_secs`.
    async fn extract_frame(
        &self,
        source: &Path,
        at_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError>;
}

/// ffmpeg/ffprobe subprocess implementation.
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, source: &Path) -> Result<SourceInfo, PipelineError> {
        ffprobe::probe(&self.ffprobe_path, source).await
    }

    async fn encode(
        &self,
        spec: &EncodeSpec,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let args = build_encode_args(spec);
        info!(label = %spec.label, output = %spec.output.display(), "spawning ffmpeg encode");

        let mut child = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // callers enforce a wall-clock deadline by dropping this future;
            // the encoder must not outlive it
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| encode_err(spec, format!("spawn: {e}")))?;

        // Drain stderr concurrently so a chatty ffmpeg never blocks on a
        // full pipe.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        match waited {
            Some(status) => {
                let status = status.map_err(|e| encode_err(spec, format!("wait: {e}")))?;
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    Ok(())
                } else {
                    Err(encode_err(
                        spec,
                        format!("ffmpeg exited with {status}: {}", stderr_tail(&stderr)),
                    ))
                }
            }
            None => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                stderr_task.abort();
                let _ = tokio::fs::remove_file(&spec.output).await;
                Err(PipelineError::Cancelled)
            }
        }
    }

    async fn extract_frame(
        &self,
        source: &Path,
        at_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let seek = format!("{at_secs:.3}");
        let result = tokio::process::Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-y", "-ss", seek.as_str(), "-i"])
            .arg(source)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(output)
            .output()
            .await
            .map_err(|e| PipelineError::ThumbnailGeneration(format!("spawn: {e}")))?;

        if result.status.success() {
            Ok(())
        } else {
            Err(PipelineError::ThumbnailGeneration(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr_tail(&result.stderr)
            )))
        }
    }
}

fn encode_err(spec: &EncodeSpec, reason: String) -> PipelineError {
    PipelineError::RenditionEncode {
        tier: spec.label.clone(),
        reason,
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim_end();
    match trimmed.char_indices().nth_back(400) {
        Some((idx, _)) => format!("…{}", &trimmed[idx..]),
        None => trimmed.to_string(),
    }
}

/// Build the ffmpeg argument list for one encode. Quality-bounded output
/// capped by the tier bitrate: CRF with -maxrate/-bufsize, never strict CBR.
pub(crate) fn build_encode_args(spec: &EncodeSpec) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    args.extend(["-i".into(), spec.input.to_string_lossy().into_owned()]);

    // Image watermarks need a second input and a filter graph; everything
    // else fits in a plain -vf chain.
    let base_chain = format!("scale={}:{},fps={}", spec.width, spec.height, spec.fps);
    match &spec.watermark {
        Some(WatermarkSpec::Image { path, position }) => {
            args.extend(["-i".into(), path.to_string_lossy().into_owned()]);
            args.extend([
                "-filter_complex".into(),
                format!(
                    "[0:v]{base_chain}[base];[base][1:v]overlay={}[out]",
                    watermark::overlay_coords(*position)
                ),
                "-map".into(),
                "[out]".into(),
                "-map".into(),
                "0:a?".into(),
            ]);
        }
        Some(WatermarkSpec::Text { text, position }) => {
            args.extend([
                "-vf".into(),
                format!(
                    "{base_chain},{}",
                    watermark::drawtext_filter(text, *position)
                ),
            ]);
        }
        None => {
            args.extend(["-vf".into(), base_chain]);
        }
    }

    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "23".into(),
        "-maxrate".into(),
        format!("{}k", spec.video_kbps),
        "-bufsize".into(),
        format!("{}k", spec.video_kbps * 2),
    ]);

    args.extend([
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", spec.audio_kbps),
    ]);

    if let Some(secs) = spec.clip_secs {
        args.extend(["-t".into(), format!("{secs:.3}")]);
    }

    args.extend([
        "-movflags".into(),
        "+faststart".into(),
        spec.output.to_string_lossy().into_owned(),
    ]);

    args
}
