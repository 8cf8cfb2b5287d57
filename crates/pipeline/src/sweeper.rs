//! Retention sweep: reclaim disk space held by aged, completed assets.
//! Purged assets go back to `pending` with their artifact columns cleared;
//! the asset record itself is never deleted.

use async_trait::async_trait;
use coursecast_db::repo::assets;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// External usage check. An asset still referenced by a live lesson must not
/// be purged; what "referenced" means is the caller's business.
#[async_trait]
pub trait ReferenceCheck: Send + Sync {
    async fn is_in_use(&self, asset_id: &str) -> bool;
}

/// Treats every candidate as purgeable. Stand-in for deployments without a
/// usage tracker, and for tests.
pub struct AlwaysEligible;

#[async_trait]
impl ReferenceCheck for AlwaysEligible {
    async fn is_in_use(&self, _asset_id: &str) -> bool {
        false
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub purged: usize,
    pub skipped_in_use: usize,
}

/// Scan completed assets older than `max_age_secs` and purge the eligible
/// ones. Individual failures never abort the rest of the sweep.
pub async fn sweep(
    pool: &SqlitePool,
    max_age_secs: i64,
    check: &dyn ReferenceCheck,
) -> Result<SweepStats, sqlx::Error> {
    let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
    let candidates = assets::list_retention_candidates(pool, cutoff).await?;

    let mut stats = SweepStats {
        scanned: candidates.len(),
        ..SweepStats::default()
    };

    for asset in &candidates {
        if check.is_in_use(&asset.id).await {
            stats.skipped_in_use += 1;
            continue;
        }
        match purge(pool, &asset.id).await {
            Ok(true) => stats.purged += 1,
            Ok(false) => {} // state moved under us, leave it alone
            Err(e) => warn!(asset_id = %asset.id, error = %e, "purge failed, continuing sweep"),
        }
    }

    info!(
        scanned = stats.scanned,
        purged = stats.purged,
        skipped = stats.skipped_in_use,
        "retention sweep finished"
    );
    Ok(stats)
}

/// Delete an asset's generated files and reset it to `pending`. File
/// deletions are continue-on-error: a missing or locked file is logged and
/// the rest still goes.
pub async fn purge(pool: &SqlitePool, asset_id: &str) -> Result<bool, sqlx::Error> {
    let Some(asset) = assets::get_asset(pool, asset_id).await? else {
        return Ok(false);
    };

    let mut files: Vec<String> = asset.renditions().into_iter().map(|r| r.path).collect();
    files.extend(asset.thumbnails());
    files.extend(asset.preview_path.clone());
    files.extend(asset.manifest_path.clone());

    for file in &files {
        if let Err(e) = tokio::fs::remove_file(file).await {
            warn!(asset_id, file, error = %e, "could not delete artifact");
        }
    }

    let reset = assets::purge_reset(pool, asset_id).await?;
    if reset {
        info!(asset_id, files = files.len(), "asset purged");
    }
    Ok(reset)
}
