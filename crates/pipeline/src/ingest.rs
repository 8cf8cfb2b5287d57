//! Upload handoff: register a source file as a pending asset. The upload
//! transport itself (HTTP, object store) lives outside this crate; all we
//! need is a readable path.

use std::path::Path;

use coursecast_db::repo::assets::{self, AssetRow};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::PipelineError;

pub async fn register(pool: &SqlitePool, source_path: &Path) -> Result<AssetRow, PipelineError> {
    let meta = tokio::fs::metadata(source_path).await?;
    let checksum = sha256_file(source_path).await?;
    let mime = mime_from_extension(source_path);

    let asset = assets::register_asset(
        pool,
        &source_path.to_string_lossy(),
        Some(&checksum),
        Some(mime),
        Some(meta.len() as i64),
    )
    .await?;

    info!(asset_id = %asset.id, source = %source_path.display(), size = meta.len(), "asset registered");
    Ok(asset)
}

async fn sha256_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn mime_from_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("ts") | Some("m2ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}
