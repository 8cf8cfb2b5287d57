use coursecast_core::asset::RenditionDescriptor;
use sqlx::SqlitePool;
use tracing::warn;

/// One media asset row. Artifact lists are stored as JSON text columns and
/// decoded on demand.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetRow {
    pub id: String,
    pub source_path: String,
    pub checksum: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub duration_secs: Option<f64>,
    pub source_width: Option<i64>,
    pub source_height: Option<i64>,
    pub source_bitrate_kbps: Option<i64>,
    pub source_fps: Option<f64>,
    pub source_codec: Option<String>,
    pub status: String,
    pub progress: f64,
    pub error: Option<String>,
    pub started_ts: Option<i64>,
    pub completed_ts: Option<i64>,
    pub renditions_json: Option<String>,
    pub thumbnails_json: Option<String>,
    pub preview_path: Option<String>,
    pub manifest_path: Option<String>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl AssetRow {
    pub fn renditions(&self) -> Vec<RenditionDescriptor> {
        decode_json(self.renditions_json.as_deref(), &self.id, "renditions_json")
    }

    pub fn thumbnails(&self) -> Vec<String> {
        decode_json(self.thumbnails_json.as_deref(), &self.id, "thumbnails_json")
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    json: Option<&str>,
    asset_id: &str,
    column: &str,
) -> Vec<T> {
    let Some(json) = json else {
        return Vec::new();
    };
    match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!(asset_id, column, error = %e, "undecodable artifact column, treating as empty");
            Vec::new()
        }
    }
}

const SELECT_COLS: &str = "id, source_path, checksum, mime_type, file_size, duration_secs, \
     source_width, source_height, source_bitrate_kbps, source_fps, source_codec, \
     status, progress, error, started_ts, completed_ts, \
     renditions_json, thumbnails_json, preview_path, manifest_path, created_ts, updated_ts";

/// Register a newly uploaded asset in `pending` state.
pub async fn register_asset(
    pool: &SqlitePool,
    source_path: &str,
    checksum: Option<&str>,
    mime_type: Option<&str>,
    file_size: Option<i64>,
) -> Result<AssetRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO media_asset (id, source_path, checksum, mime_type, file_size, status, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(source_path)
    .bind(checksum)
    .bind(mime_type)
    .bind(file_size)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(AssetRow {
        id,
        source_path: source_path.to_string(),
        checksum: checksum.map(String::from),
        mime_type: mime_type.map(String::from),
        file_size,
        duration_secs: None,
        source_width: None,
        source_height: None,
        source_bitrate_kbps: None,
        source_fps: None,
        source_codec: None,
        status: "pending".to_string(),
        progress: 0.0,
        error: None,
        started_ts: None,
        completed_ts: None,
        renditions_json: None,
        thumbnails_json: None,
        preview_path: None,
        manifest_path: None,
        created_ts: now,
        updated_ts: now,
    })
}

pub async fn get_asset(pool: &SqlitePool, asset_id: &str) -> Result<Option<AssetRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM media_asset WHERE id = ?"
    ))
    .bind(asset_id)
    .fetch_optional(pool)
    .await
}

/// Oldest pending assets first, for the worker poll loop.
pub async fn list_pending(pool: &SqlitePool, limit: i64) -> Result<Vec<AssetRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM media_asset WHERE status = 'pending' ORDER BY created_ts ASC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Claim an asset for processing: pending → processing. Returns false when the
/// asset is in any other state, which makes duplicate queue deliveries no-ops.
pub async fn claim(pool: &SqlitePool, asset_id: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE media_asset SET status = 'processing', started_ts = ?, completed_ts = NULL, \
         progress = 0, error = NULL, updated_ts = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Persist probed source metadata on the claimed asset.
pub async fn set_source_info(
    pool: &SqlitePool,
    asset_id: &str,
    duration_secs: f64,
    width: u32,
    height: u32,
    bitrate_kbps: Option<u32>,
    fps: Option<f64>,
    codec: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE media_asset SET duration_secs = ?, source_width = ?, source_height = ?, \
         source_bitrate_kbps = ?, source_fps = ?, source_codec = ?, updated_ts = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(duration_secs)
    .bind(width as i64)
    .bind(height as i64)
    .bind(bitrate_kbps.map(|b| b as i64))
    .bind(fps)
    .bind(codec)
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Best-effort observability only; never authoritative.
pub async fn set_progress(pool: &SqlitePool, asset_id: &str, pct: f64) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result =
        sqlx::query("UPDATE media_asset SET progress = ?, updated_ts = ? WHERE id = ?")
            .bind(pct.clamp(0.0, 100.0))
            .bind(now)
            .bind(asset_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// processing → completed, populating every artifact column in one statement
/// so the rendition list only ever becomes visible together with the status.
pub async fn mark_completed(
    pool: &SqlitePool,
    asset_id: &str,
    renditions: &[RenditionDescriptor],
    thumbnails: &[String],
    preview_path: Option<&str>,
    manifest_path: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let renditions_json =
        serde_json::to_string(renditions).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let thumbnails_json =
        serde_json::to_string(thumbnails).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let result = sqlx::query(
        "UPDATE media_asset SET status = 'completed', progress = 100, completed_ts = ?, \
         renditions_json = ?, thumbnails_json = ?, preview_path = ?, manifest_path = ?, \
         error = NULL, updated_ts = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(now)
    .bind(renditions_json)
    .bind(thumbnails_json)
    .bind(preview_path)
    .bind(manifest_path)
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// processing → failed. Artifact columns stay cleared; a failed asset never
/// exposes a partial rendition set.
pub async fn mark_failed(
    pool: &SqlitePool,
    asset_id: &str,
    error: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE media_asset SET status = 'failed', completed_ts = ?, error = ?, \
         renditions_json = NULL, thumbnails_json = NULL, preview_path = NULL, \
         manifest_path = NULL, updated_ts = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(now)
    .bind(error)
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Explicit operator action: failed → pending.
pub async fn requeue(pool: &SqlitePool, asset_id: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE media_asset SET status = 'pending', error = NULL, progress = 0, \
         started_ts = NULL, completed_ts = NULL, updated_ts = ? \
         WHERE id = ? AND status = 'failed'",
    )
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Retention purge: completed → pending with artifact columns cleared. The
/// row itself is never deleted.
pub async fn purge_reset(pool: &SqlitePool, asset_id: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE media_asset SET status = 'pending', progress = 0, started_ts = NULL, \
         completed_ts = NULL, renditions_json = NULL, thumbnails_json = NULL, \
         preview_path = NULL, manifest_path = NULL, updated_ts = ? \
         WHERE id = ? AND status = 'completed'",
    )
    .bind(now)
    .bind(asset_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Completed assets whose completion timestamp is at or before `cutoff_ts`.
pub async fn list_retention_candidates(
    pool: &SqlitePool,
    cutoff_ts: i64,
) -> Result<Vec<AssetRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM media_asset \
         WHERE status = 'completed' AND completed_ts IS NOT NULL AND completed_ts <= ? \
         ORDER BY completed_ts ASC"
    ))
    .bind(cutoff_ts)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = crate::connect_memory().await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        pool
    }

    fn rendition(tier: &str) -> RenditionDescriptor {
        RenditionDescriptor {
            tier: tier.to_string(),
            width: 1280,
            height: 720,
            video_kbps: 2800,
            audio_kbps: 128,
            fps: 30,
            path: format!("/out/{tier}.mp4"),
        }
    }

    #[tokio::test]
    async fn register_creates_pending_asset() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/lesson.mp4", Some("abc"), Some("video/mp4"), Some(42))
            .await
            .unwrap();
        assert_eq!(asset.status, "pending");

        let loaded = get_asset(&pool, &asset.id).await.unwrap().unwrap();
        assert_eq!(loaded.source_path, "/in/lesson.mp4");
        assert_eq!(loaded.checksum.as_deref(), Some("abc"));
        assert!(loaded.renditions().is_empty());
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/a.mp4", None, None, None).await.unwrap();

        assert!(claim(&pool, &asset.id).await.unwrap());
        // second delivery of the same job is a no-op
        assert!(!claim(&pool, &asset.id).await.unwrap());

        let loaded = get_asset(&pool, &asset.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, "processing");
        assert!(loaded.started_ts.is_some());
    }

    #[tokio::test]
    async fn complete_populates_artifacts_atomically() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/a.mp4", None, None, None).await.unwrap();
        claim(&pool, &asset.id).await.unwrap();

        let renditions = vec![rendition("720p"), rendition("360p")];
        let thumbs = vec!["/out/thumb-001.jpg".to_string()];
        assert!(
            mark_completed(
                &pool,
                &asset.id,
                &renditions,
                &thumbs,
                Some("/out/preview.mp4"),
                Some("/out/master.m3u8"),
            )
            .await
            .unwrap()
        );

        let loaded = get_asset(&pool, &asset.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, "completed");
        assert_eq!(loaded.progress, 100.0);
        assert_eq!(loaded.renditions(), renditions);
        assert_eq!(loaded.thumbnails(), thumbs);
        assert!(loaded.completed_ts.is_some());

        // completed is terminal: cannot be claimed or completed again
        assert!(!claim(&pool, &asset.id).await.unwrap());
        assert!(!mark_completed(&pool, &asset.id, &[], &[], None, None).await.unwrap());
    }

    #[tokio::test]
    async fn fail_then_requeue() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/a.mp4", None, None, None).await.unwrap();

        // failing an unclaimed asset is illegal
        assert!(!mark_failed(&pool, &asset.id, "boom").await.unwrap());

        claim(&pool, &asset.id).await.unwrap();
        assert!(mark_failed(&pool, &asset.id, "encode blew up").await.unwrap());

        let loaded = get_asset(&pool, &asset.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, "failed");
        assert_eq!(loaded.error.as_deref(), Some("encode blew up"));
        assert!(loaded.renditions().is_empty());

        // only an explicit re-queue brings it back to pending
        assert!(!claim(&pool, &asset.id).await.unwrap());
        assert!(requeue(&pool, &asset.id).await.unwrap());
        assert!(claim(&pool, &asset.id).await.unwrap());
    }

    #[tokio::test]
    async fn purge_resets_completed_only() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/a.mp4", None, None, None).await.unwrap();

        assert!(!purge_reset(&pool, &asset.id).await.unwrap());

        claim(&pool, &asset.id).await.unwrap();
        mark_completed(&pool, &asset.id, &[rendition("720p")], &[], None, None)
            .await
            .unwrap();

        assert!(purge_reset(&pool, &asset.id).await.unwrap());
        let loaded = get_asset(&pool, &asset.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, "pending");
        assert!(loaded.renditions().is_empty());
        assert!(loaded.preview_path.is_none());
    }

    #[tokio::test]
    async fn retention_candidates_respect_cutoff() {
        let pool = test_pool().await;
        let asset = register_asset(&pool, "/in/a.mp4", None, None, None).await.unwrap();
        claim(&pool, &asset.id).await.unwrap();
        mark_completed(&pool, &asset.id, &[rendition("720p")], &[], None, None)
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp();
        let eligible = list_retention_candidates(&pool, now).await.unwrap();
        assert_eq!(eligible.len(), 1);

        let none = list_retention_candidates(&pool, now - 3600).await.unwrap();
        assert!(none.is_empty());
    }
}
