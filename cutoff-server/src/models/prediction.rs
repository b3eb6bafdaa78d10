//! Predictor request and response types

use serde::{Deserialize, Serialize};

use super::de;

/// Width of the percentile window on each side of the requested value
pub const PERCENTILE_WINDOW: f64 = 10.0;

/// Distinct values surfaced per relaxed filter
pub const MAX_SUGGESTIONS: usize = 5;

/// POST /api/predict body as sent by the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default, deserialize_with = "de::opt_number")]
    pub percentile: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub college_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub category: Option<String>,
}

/// Optional predictor filters; blank values count as absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictFilters {
    /// Case-insensitive substring match
    pub college_name: Option<String>,
    /// Case-insensitive substring match
    pub branch_name: Option<String>,
    /// Exact, case-sensitive match
    pub category: Option<String>,
}

/// Validated predictor query
#[derive(Debug, Clone, PartialEq)]
pub struct PredictQuery {
    pub percentile: f64,
    pub filters: PredictFilters,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PredictRequest {
    /// Validate into a query; a missing or non-numeric percentile is an error
    pub fn into_query(self) -> Result<PredictQuery, String> {
        let percentile = self
            .percentile
            .ok_or_else(|| "Percentile is required".to_string())?;

        Ok(PredictQuery {
            percentile,
            filters: PredictFilters {
                college_name: non_blank(self.college_name),
                branch_name: non_blank(self.branch_name),
                category: non_blank(self.category),
            },
        })
    }
}

impl PredictQuery {
    /// Inclusive percentile bounds searched
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.percentile - PERCENTILE_WINDOW,
            self.percentile + PERCENTILE_WINDOW,
        )
    }
}

/// One distinct predictor match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PredictedCollege {
    pub college_name: String,
    pub branch_name: String,
    pub category: String,
    pub percentile: f64,
}

/// Values that would have produced results had one filter been dropped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub college_name: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch_name: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.college_name.is_empty() && self.branch_name.is_empty() && self.category.is_empty()
    }
}

/// POST /api/predict response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub colleges: Vec<PredictedCollege>,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}
