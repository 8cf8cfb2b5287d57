use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use coursecast_core::job::{JobOptions, TranscodeJob};
use coursecast_pipeline::PipelineConfig;
use coursecast_pipeline::engine::FfmpegEngine;
use coursecast_pipeline::sweeper::{self, AlwaysEligible};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let db_path = env_or("COURSECAST_DB", "coursecast.db");
    info!(db_path = %db_path, "connecting to database");

    let pool = coursecast_db::connect(&db_path)
        .await
        .context("failed to connect to database")?;

    coursecast_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    let output_root: PathBuf = env_or("COURSECAST_OUTPUT_DIR", "/var/lib/coursecast/media").into();
    tokio::fs::create_dir_all(&output_root)
        .await
        .context("failed to create output dir")?;

    let cfg = Arc::new(PipelineConfig {
        ffmpeg_path: env_or("COURSECAST_FFMPEG", "ffmpeg").into(),
        ffprobe_path: env_or("COURSECAST_FFPROBE", "ffprobe").into(),
        thumbnail_count: env_parse("COURSECAST_THUMBNAILS", 5),
        preview_max_secs: env_parse("COURSECAST_PREVIEW_SECS", 30.0),
        encode_timeout_secs: env_parse("COURSECAST_ENCODE_TIMEOUT_SECS", 1800),
    });
    let engine = Arc::new(FfmpegEngine::new(
        cfg.ffmpeg_path.clone(),
        cfg.ffprobe_path.clone(),
    ));

    // Any source files passed on the command line are registered before the
    // loop starts, handy for local runs without an upload service.
    for arg in std::env::args().skip(1) {
        match coursecast_pipeline::ingest::register(&pool, PathBuf::from(&arg).as_path()).await {
            Ok(asset) => info!(asset_id = %asset.id, source = %arg, "registered from argv"),
            Err(e) => warn!(source = %arg, error = %e, "could not register source"),
        }
    }

    // Periodic retention sweep
    {
        let pool = pool.clone();
        let retention_days: i64 = env_parse("COURSECAST_RETENTION_DAYS", 30);
        let sweep_interval: u64 = env_parse("COURSECAST_SWEEP_INTERVAL_SECS", 3600);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(sweep_interval)).await;
                if let Err(e) =
                    sweeper::sweep(&pool, retention_days * 24 * 3600, &AlwaysEligible).await
                {
                    error!(error = %e, "retention sweep failed");
                }
            }
        });
    }

    let max_concurrent: usize = env_parse("COURSECAST_MAX_CONCURRENT", 2);
    let poll_secs: u64 = env_parse("COURSECAST_POLL_SECS", 5);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_concurrent));
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, cancelling in-flight encodes");
                shutdown.cancel();
            }
        });
    }

    info!(max_concurrent, poll_secs, "worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let pending = next_batch(&pool, max_concurrent as i64).await;

        for asset in pending {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let pool = pool.clone();
            let engine = engine.clone();
            let cfg = cfg.clone();
            let cancel = shutdown.child_token();
            let job = TranscodeJob {
                output_dir: output_root.join(&asset.id),
                asset_id: asset.id,
                source_path: PathBuf::from(asset.source_path),
                options: JobOptions::default(),
            };
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) =
                    coursecast_pipeline::runner::run_job(&pool, engine.as_ref(), &cfg, &job, &cancel)
                        .await
                {
                    // already persisted as failed; the queue decides on retry
                    error!(asset_id = %job.asset_id, error = %e, "job failed");
                }
            });
        }

        // Pause before re-listing so the spawned claims land first; a batch
        // whose claims are still in flight would only produce no-op respawns.
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(poll_secs)) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!("worker stopped");
    Ok(())
}

/// List claimable assets, treating a transient database error as an empty
/// batch rather than tearing down the worker.
async fn next_batch(
    pool: &coursecast_db::SqlitePool,
    limit: i64,
) -> Vec<coursecast_db::repo::assets::AssetRow> {
    match coursecast_db::repo::assets::list_pending(pool, limit).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "could not list pending assets");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_failure_yields_an_empty_batch() {
        // no migrations have run, so the asset table does not exist
        let pool = coursecast_db::connect_memory().await.unwrap();
        assert!(next_batch(&pool, 4).await.is_empty());
    }
}
