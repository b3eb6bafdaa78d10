//! On-disk JSON mirror of the cutoff table

use cutoff_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::db::cutoffs;
use crate::models::CutoffRecord;

/// Write `records` as a pretty-printed JSON array
///
/// Written to a uniquely named sibling temp file and renamed, so readers
/// never see a partial file and concurrent writers never share a temp file.
pub async fn write_snapshot(path: &Path, records: &[CutoffRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(records)
        .map_err(|e| cutoff_common::Error::Internal(format!("Failed to serialize snapshot: {}", e)))?;

    let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Mirror the whole table to `path`; returns the number of rows written
pub async fn mirror_table(pool: &SqlitePool, path: &Path) -> Result<usize> {
    let records = cutoffs::list_all(pool).await?;
    write_snapshot(path, &records).await?;
    info!(rows = records.len(), path = %path.display(), "Snapshot written");
    Ok(records.len())
}

/// Replace the snapshot with an empty array
pub async fn clear_snapshot(path: &Path) -> Result<()> {
    write_snapshot(path, &[]).await
}
