//! Predictor query step with filter relaxation

use cutoff_common::Result;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::cutoffs::{self, FilterField};
use crate::models::{PredictQuery, PredictResponse, Suggestions, prediction::MAX_SUGGESTIONS};

/// Run a predictor query
///
/// When nothing matches, each present filter is dropped in turn and up to
/// five distinct values of the dropped field that would have matched are
/// returned as suggestions.
pub async fn predict(pool: &SqlitePool, query: &PredictQuery) -> Result<PredictResponse> {
    let colleges = cutoffs::predict(pool, query).await?;
    if !colleges.is_empty() {
        return Ok(PredictResponse {
            total: colleges.len(),
            colleges,
            suggestions: None,
        });
    }

    let suggestions = suggest(pool, query).await?;
    debug!(
        percentile = query.percentile,
        has_suggestions = !suggestions.is_empty(),
        "Predictor returned no rows"
    );

    Ok(PredictResponse {
        colleges,
        total: 0,
        suggestions: (!suggestions.is_empty()).then_some(suggestions),
    })
}

async fn suggest(pool: &SqlitePool, query: &PredictQuery) -> Result<Suggestions> {
    let mut suggestions = Suggestions::default();

    for field in FilterField::ALL {
        if field.value(&query.filters).is_none() {
            continue;
        }
        let relaxed = field.without(&query.filters);
        let values = cutoffs::matching_values(pool, query, &relaxed, field, MAX_SUGGESTIONS).await?;

        match field {
            FilterField::CollegeName => suggestions.college_name = values,
            FilterField::BranchName => suggestions.branch_name = values,
            FilterField::Category => suggestions.category = values,
        }
    }

    Ok(suggestions)
}
