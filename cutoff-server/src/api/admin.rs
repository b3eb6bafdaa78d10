//! Admin data endpoints: browse, reset and synchronous re-processing

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cutoff_common::events::WAITING_STATUS;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::store_failure;
use crate::db::cutoffs;
use crate::error::{ApiError, ApiResult};
use crate::pagination::Pagination;
use crate::services::snapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub page: Option<i64>,
}

/// GET /api/admin/data?page=N
pub async fn get_data(State(state): State<AppState>, Query(query): Query<DataQuery>) -> Response {
    let count = match cutoffs::count(&state.db).await {
        Ok(count) => count,
        Err(e) => return store_failure("Failed to fetch college data", &e, json!({ "data": [] })),
    };

    let pagination = Pagination::new(count, query.page.unwrap_or(1));
    if count == 0 {
        return Json(json!({
            "data": [],
            "count": 0,
            "page": pagination.page,
            "pageSize": pagination.page_size,
            "totalPages": 0,
            "message": "No data available yet. Upload data first.",
        }))
        .into_response();
    }

    match cutoffs::list_page(&state.db, pagination.offset, pagination.page_size).await {
        Ok(rows) => Json(json!({
            "data": rows,
            "count": pagination.count,
            "page": pagination.page,
            "pageSize": pagination.page_size,
            "totalPages": pagination.total_pages,
        }))
        .into_response(),
        Err(e) => store_failure("Failed to fetch college data", &e, json!({ "data": [] })),
    }
}

/// POST /api/admin/reset
///
/// Clears the on-disk snapshot, then every row of the cutoff table.
pub async fn reset_data(State(state): State<AppState>) -> Response {
    info!("Starting data reset");

    if let Err(e) = snapshot::clear_snapshot(&state.config.snapshot_path()).await {
        error!("Failed to clear snapshot: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to reset data", "details": e.to_string() })),
        )
            .into_response();
    }

    let result = async {
        let before = cutoffs::count(&state.db).await?;
        let removed = cutoffs::clear(&state.db).await?;
        let after = cutoffs::count(&state.db).await?;
        Ok::<_, cutoff_common::Error>((before, removed, after))
    }
    .await;

    match result {
        Ok((before, removed, after)) => {
            info!(before, removed, after, "Cutoff data reset");
            Json(json!({
                "success": true,
                "message": "Database and output.json have been cleared successfully",
                "details": {
                    "database": {
                        "status": "Table cutoff_data cleared",
                        "recordsBefore": before,
                        "recordsAfter": after,
                    },
                    "outputJson": "Cleared",
                },
            }))
            .into_response()
        }
        Err(e) => store_failure("Failed to reset data", &e, json!({})),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub file_id: Option<String>,
}

/// Stored upload for a file id (`<uploads>/<id>-<name>`)
pub async fn find_upload(upload_dir: &Path, file_id: Uuid) -> std::io::Result<Option<PathBuf>> {
    let prefix = format!("{}-", file_id);
    let mut entries = match tokio::fs::read_dir(upload_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// POST /api/admin/process
///
/// Re-runs extraction and persistence for a stored upload and waits for
/// the outcome. Progress is published under the same id, so a progress
/// stream opened for it follows the run.
pub async fn process_file(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let raw = request
        .file_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No fileId provided".to_string()))?;
    let file_id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid fileId: {}", raw)))?;

    let path = find_upload(&state.config.upload_dir(), file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    if !state.progress.open_job(file_id, Some(path.clone()), WAITING_STATUS) {
        return Err(ApiError::Conflict(format!(
            "File {} is still being processed",
            file_id
        )));
    }

    info!(job_id = %file_id, path = %path.display(), "Re-processing upload");
    // Detached so a client disconnect cannot cut the run short
    let pipeline = Arc::clone(&state.pipeline);
    let run = tokio::spawn(async move { pipeline.run(file_id, &path).await });
    let outcome = run.await.map_err(|e| {
        state
            .progress
            .fail(file_id, "Error processing PDF", format!("Processing task failed: {}", e));
        ApiError::Internal(format!("Processing task failed: {}", e))
    })?;

    match outcome {
        Ok(summary) => Ok(Json(json!({
            "success": true,
            "message": "PDF processed and data saved to database",
            "stats": summary,
        }))
        .into_response()),
        Err(e) if e.is_empty_output() => {
            warn!(job_id = %file_id, "Re-processing found no data: {}", e);
            Err(ApiError::BadRequest(
                "No valid data could be extracted from the PDF".to_string(),
            ))
        }
        Err(e) => Err(ApiError::Internal(format!("Failed to process PDF: {}", e))),
    }
}
