//! Progress stream endpoint (SSE)

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use cutoff_common::sse::create_progress_sse_stream;
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// How long the stream stays open after the terminal event
pub const CLOSE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub file_id: Option<String>,
}

/// GET /api/admin/progress?fileId=<id>
///
/// Sends the job's last known state first (or the waiting default for
/// unknown ids), then each later event, and closes shortly after the
/// terminal one. A client disconnect drops the subscription.
pub async fn progress_stream(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let raw = query
        .file_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("fileId is required".to_string()))?;
    let job_id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid fileId: {}", raw)))?;

    debug!(job_id = %job_id, "Progress stream opened");
    let events = state.progress.subscribe(job_id);
    Ok(create_progress_sse_stream(events, CLOSE_DELAY))
}
