//! cutoff-server library interface
//!
//! College cutoff predictor service: public predictor queries plus an
//! admin area that uploads cutoff PDFs, extracts records through an external
//! process, streams extraction progress over SSE and stores the results.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use cutoff_common::config::ServerConfig;
use cutoff_common::events::ProgressChannel;
use cutoff_common::session::SessionCodec;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{ExtractionInvoker, IngestPipeline};

/// Undelivered progress events buffered per subscriber
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Job registry and progress broadcast
    pub progress: Arc<ProgressChannel>,
    /// Extraction and persistence for uploads
    pub pipeline: Arc<IngestPipeline>,
    pub config: Arc<ServerConfig>,
    /// Admin session cookie codec
    pub sessions: SessionCodec,
    /// Service startup timestamp
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServerConfig) -> Self {
        let progress = Arc::new(ProgressChannel::new(PROGRESS_CHANNEL_CAPACITY));
        let pipeline = Arc::new(IngestPipeline::new(
            db.clone(),
            Arc::clone(&progress),
            ExtractionInvoker::from_config(&config),
            config.max_concurrent_extractions,
            config.snapshot_path(),
        ));
        let sessions = SessionCodec::new(&config.session_secret, config.session_max_age);

        Self {
            db,
            progress,
            pipeline,
            config: Arc::new(config),
            sessions,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Admin routes require a valid session cookie; auth, predictor and health
/// routes are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = api::admin_routes(state.config.max_upload_bytes).layer(
        middleware::from_fn_with_state(state.clone(), api::require_admin),
    );

    let public = Router::new()
        .merge(api::auth_routes())
        .merge(api::predictor_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
