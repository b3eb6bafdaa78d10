//! HTTP API handlers for cutoff-server

pub mod admin;
pub mod auth;
pub mod health;
pub mod predict;
pub mod progress;
pub mod upload;

pub use auth::{auth_routes, require_admin};
pub use health::health_routes;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::AppState;

/// Admin routes; the caller layers [`require_admin`] on top
pub fn admin_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/admin/progress", get(progress::progress_stream))
        .route("/api/admin/process", post(admin::process_file))
        .route("/api/admin/data", get(admin::get_data))
        .route("/api/admin/reset", post(admin::reset_data))
}

/// Public predictor routes
pub fn predictor_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict", post(predict::predict))
        .route("/api/options", get(predict::options))
}

/// 500 response for a failing store, keeping the endpoint's fallback fields
///
/// `fallback` must be a JSON object; `error` and `details` are added to it.
pub(crate) fn store_failure(
    message: &str,
    err: &cutoff_common::Error,
    fallback: Value,
) -> Response {
    tracing::error!("{}: {}", message, err);
    let mut body = match fallback {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    body.insert("error".to_string(), json!(message));
    body.insert("details".to_string(), json!(err.to_string()));
    body.insert("code".to_string(), json!("STORE_UNAVAILABLE"));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::Object(body))).into_response()
}
