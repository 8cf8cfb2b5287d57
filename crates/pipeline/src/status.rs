use coursecast_core::asset::ProcessingStatus;
use coursecast_db::repo::assets;
use sqlx::SqlitePool;

/// Answer for the external status query interface.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatusReport {
    pub status: ProcessingStatus,
    /// Best-effort, 0 when unknown.
    pub progress_percent: u8,
    /// Set only when the asset failed.
    pub error_message: Option<String>,
}

pub async fn query(pool: &SqlitePool, asset_id: &str) -> Result<Option<StatusReport>, sqlx::Error> {
    let Some(row) = assets::get_asset(pool, asset_id).await? else {
        return Ok(None);
    };

    let status = ProcessingStatus::parse(&row.status).unwrap_or(ProcessingStatus::Pending);
    Ok(Some(StatusReport {
        status,
        progress_percent: row.progress.clamp(0.0, 100.0).round() as u8,
        error_message: match status {
            ProcessingStatus::Failed => row.error,
            _ => None,
        },
    }))
}
