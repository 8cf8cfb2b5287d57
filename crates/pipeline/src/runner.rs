//! Drives one transcode job end to end: claim, probe, plan, encode, derive
//! thumbnails/preview, write the manifest, finalize the state machine.

use std::time::Duration;

use coursecast_core::asset::RenditionDescriptor;
use coursecast_core::job::TranscodeJob;
use coursecast_db::repo::assets;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::{EncodeSpec, MediaEngine};
use crate::planner::{self, RenditionJob};
use crate::{manifest, thumbs, PipelineConfig, PipelineError};

#[derive(Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// The asset was not in `pending`: duplicate queue delivery, no-op.
    AlreadyClaimed,
}

#[derive(Debug, Default)]
struct Artifacts {
    renditions: Vec<RenditionDescriptor>,
    thumbnails: Vec<String>,
    preview_path: Option<String>,
    manifest_path: Option<String>,
}

/// Process one job. Fatal errors mark the asset `failed` (with the rendered
/// cause) and are returned so the queue collaborator can decide on a retry.
pub async fn run_job(
    pool: &SqlitePool,
    engine: &dyn MediaEngine,
    cfg: &PipelineConfig,
    job: &TranscodeJob,
    cancel: &CancellationToken,
) -> Result<JobOutcome, PipelineError> {
    if !assets::claim(pool, &job.asset_id).await? {
        warn!(asset_id = %job.asset_id, "claim rejected, asset not pending");
        return Ok(JobOutcome::AlreadyClaimed);
    }
    info!(asset_id = %job.asset_id, source = %job.source_path.display(), "asset claimed");

    match execute(pool, engine, cfg, job, cancel).await {
        Ok(artifacts) => {
            assets::mark_completed(
                pool,
                &job.asset_id,
                &artifacts.renditions,
                &artifacts.thumbnails,
                artifacts.preview_path.as_deref(),
                artifacts.manifest_path.as_deref(),
            )
            .await?;
            info!(
                asset_id = %job.asset_id,
                renditions = artifacts.renditions.len(),
                thumbnails = artifacts.thumbnails.len(),
                "asset completed"
            );
            Ok(JobOutcome::Completed)
        }
        Err(e) => {
            error!(asset_id = %job.asset_id, error = %e, "asset failed");
            if let Err(db_err) = assets::mark_failed(pool, &job.asset_id, &e.to_string()).await {
                error!(asset_id = %job.asset_id, error = %db_err, "could not persist failure");
            }
            Err(e)
        }
    }
}

async fn execute(
    pool: &SqlitePool,
    engine: &dyn MediaEngine,
    cfg: &PipelineConfig,
    job: &TranscodeJob,
    cancel: &CancellationToken,
) -> Result<Artifacts, PipelineError> {
    let source = engine.probe(&job.source_path).await?;
    assets::set_source_info(
        pool,
        &job.asset_id,
        source.duration_secs,
        source.width,
        source.height,
        source.bitrate_kbps,
        source.fps,
        &source.codec,
    )
    .await?;

    let planned = planner::plan(&source, job.options.quality_profiles.as_deref());
    info!(
        asset_id = %job.asset_id,
        tiers = ?planned.iter().map(|j| j.tier.as_str()).collect::<Vec<_>>(),
        "renditions planned"
    );

    tokio::fs::create_dir_all(&job.output_dir).await?;

    let mut artifacts = Artifacts::default();
    for (i, r) in planned.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        artifacts
            .renditions
            .push(encode_rendition(engine, cfg, job, r, cancel).await?);

        // best-effort observability; renditions span 0–90%
        let pct = (i + 1) as f64 / planned.len() as f64 * 90.0;
        if let Err(e) = assets::set_progress(pool, &job.asset_id, pct).await {
            warn!(asset_id = %job.asset_id, error = %e, "progress update failed");
        }
    }

    if job.options.generate_thumbnails {
        match thumbs::generate_thumbnails(
            engine,
            &job.source_path,
            source.duration_secs,
            cfg.thumbnail_count,
            &job.output_dir,
        )
        .await
        {
            Ok(paths) => artifacts.thumbnails = paths,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(asset_id = %job.asset_id, error = %e, "continuing without thumbnails"),
        }
    }

    if job.options.create_preview {
        // planned is ordered highest → lowest, so the last entry is the
        // cheapest profile (or the native job when no tier qualified)
        let lowest = &planned[planned.len() - 1];
        match thumbs::generate_preview(
            engine,
            &job.source_path,
            source.duration_secs,
            cfg.preview_max_secs,
            lowest,
            &job.output_dir,
            cancel,
        )
        .await
        {
            Ok(path) => artifacts.preview_path = path,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(asset_id = %job.asset_id, error = %e, "continuing without preview"),
        }
    }

    if job.options.adaptive_bitrate {
        artifacts.manifest_path =
            Some(manifest::write(&job.output_dir, &artifacts.renditions).await?);
    }

    Ok(artifacts)
}

async fn encode_rendition(
    engine: &dyn MediaEngine,
    cfg: &PipelineConfig,
    job: &TranscodeJob,
    rendition: &RenditionJob,
    cancel: &CancellationToken,
) -> Result<RenditionDescriptor, PipelineError> {
    let output = job.output_dir.join(&rendition.filename);
    let spec = EncodeSpec {
        input: job.source_path.clone(),
        output: output.clone(),
        label: rendition.tier.clone(),
        width: rendition.width,
        height: rendition.height,
        video_kbps: rendition.video_kbps,
        audio_kbps: rendition.audio_kbps,
        fps: rendition.fps,
        clip_secs: None,
        watermark: job.options.watermark.clone(),
    };

    let ceiling = Duration::from_secs(cfg.encode_timeout_secs);
    match tokio::time::timeout(ceiling, engine.encode(&spec, cancel)).await {
        Ok(Ok(())) => Ok(RenditionDescriptor {
            tier: rendition.tier.clone(),
            width: rendition.width,
            height: rendition.height,
            video_kbps: rendition.video_kbps,
            audio_kbps: rendition.audio_kbps,
            fps: rendition.fps,
            path: output.to_string_lossy().into_owned(),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(PipelineError::RenditionEncode {
            tier: rendition.tier.clone(),
            reason: format!("timed out after {}s", cfg.encode_timeout_secs),
        }),
    }
}
