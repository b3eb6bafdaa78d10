//! Public predictor endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::store_failure;
use crate::db::cutoffs::{self, FilterField};
use crate::error::ApiError;
use crate::models::PredictRequest;
use crate::services::predictor;
use crate::AppState;

/// POST /api/predict
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let query = match request.into_query() {
        Ok(query) => query,
        Err(message) => return ApiError::BadRequest(message).into_response(),
    };

    match predictor::predict(&state.db, &query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => store_failure(
            "Failed to predict colleges",
            &e,
            json!({ "colleges": [], "total": 0 }),
        ),
    }
}

/// GET /api/options
///
/// Distinct colleges, branches and categories for the predictor form.
/// Each list is fetched independently; a failing one comes back empty and
/// the response status is 500.
pub async fn options(State(state): State<AppState>) -> Response {
    let mut lists = Vec::with_capacity(3);
    let mut failure = None;

    for field in FilterField::ALL {
        match cutoffs::distinct_values(&state.db, field).await {
            Ok(values) => lists.push(values),
            Err(e) => {
                tracing::error!(column = field.column(), "Failed to fetch options: {}", e);
                lists.push(Vec::new());
                failure.get_or_insert(e);
            }
        }
    }

    let body = json!({
        "colleges": lists[0],
        "branches": lists[1],
        "categories": lists[2],
    });
    match failure {
        None => Json(body).into_response(),
        Some(e) => store_failure("Failed to fetch options", &e, body),
    }
}
