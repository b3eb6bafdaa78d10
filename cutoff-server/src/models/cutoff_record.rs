//! Admission cutoff records
//!
//! [`ExtractedRecord`] is whatever the extraction process wrote: every field
//! optional and loosely typed. [`CutoffRecord`] is a validated row ready for
//! insertion.
//!
//! Validation contract: `college_name`, `branch_name` and `category` must be
//! present and non-blank; `percentile` must be a finite number in [0, 100].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::de;

/// Record-shaped object as produced by the extraction process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default, deserialize_with = "de::opt_text")]
    pub college_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub college_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub branch_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub rank: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub percentile: Option<f64>,
}

/// Why an extracted record cannot be inserted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordRejection {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("percentile {0} outside 0-100")]
    PercentileOutOfRange(f64),
}

/// One validated row of the `cutoff_data` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CutoffRecord {
    pub college_id: Option<String>,
    pub college_name: String,
    pub branch_id: Option<String>,
    pub branch_name: String,
    pub status: Option<String>,
    pub category: String,
    /// Text: may be non-numeric in source documents
    pub rank: Option<String>,
    pub percentile: f64,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RecordRejection> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(RecordRejection::MissingField(field))
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<ExtractedRecord> for CutoffRecord {
    type Error = RecordRejection;

    fn try_from(raw: ExtractedRecord) -> Result<Self, Self::Error> {
        let college_name = required(raw.college_name, "college_name")?;
        let branch_name = required(raw.branch_name, "branch_name")?;
        let category = required(raw.category, "category")?;
        let percentile = raw
            .percentile
            .ok_or(RecordRejection::MissingField("percentile"))?;
        if !(0.0..=100.0).contains(&percentile) {
            return Err(RecordRejection::PercentileOutOfRange(percentile));
        }

        Ok(Self {
            college_id: optional(raw.college_id),
            college_name,
            branch_id: optional(raw.branch_id),
            branch_name,
            status: optional(raw.status),
            category,
            rank: optional(raw.rank),
            percentile,
        })
    }
}
