//! Persistence step: validate extracted records and write them to the store
//!
//! Records are inserted one at a time. An invalid record or a failing insert
//! is logged and recorded in the summary's failure list; it never aborts the
//! rest of the batch. The batch is not transactional.

use cutoff_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{self, cutoffs};
use crate::models::{CutoffRecord, ExtractedRecord};

/// One record that was not stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    /// Zero-based position in the extraction output
    pub index: usize,
    pub college_name: Option<String>,
    pub reason: String,
}

/// Outcome of one persistence run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSummary {
    /// Records handed to the step
    pub total_records: usize,
    /// Valid records whose insert was attempted without error
    pub added_records: usize,
    /// Of `added_records`, those skipped as duplicates
    pub duplicate_records: usize,
    /// Distinct college names of added records, in order of first appearance
    pub colleges: Vec<String>,
    pub failures: Vec<RecordFailure>,
}

impl PersistenceSummary {
    fn note_college(&mut self, name: &str) {
        if !self.colleges.iter().any(|c| c == name) {
            self.colleges.push(name.to_string());
        }
    }
}

/// Validate and insert `records`
///
/// Fails only when the table cannot be ensured; per-record problems end up
/// in [`PersistenceSummary::failures`].
pub async fn persist_records(
    pool: &SqlitePool,
    records: Vec<ExtractedRecord>,
) -> Result<PersistenceSummary> {
    db::ensure_schema(pool).await?;

    let mut summary = PersistenceSummary {
        total_records: records.len(),
        ..Default::default()
    };

    for (index, raw) in records.into_iter().enumerate() {
        let college_name = raw
            .college_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let record = match CutoffRecord::try_from(raw) {
            Ok(record) => record,
            Err(rejection) => {
                warn!(index, college = ?college_name, "Skipping invalid record: {}", rejection);
                summary.failures.push(RecordFailure {
                    index,
                    college_name,
                    reason: rejection.to_string(),
                });
                continue;
            }
        };

        match cutoffs::insert_record(pool, &record).await {
            Ok(inserted) => {
                summary.added_records += 1;
                summary.note_college(&record.college_name);
                if !inserted {
                    debug!(index, college = %record.college_name, "Duplicate record skipped");
                    summary.duplicate_records += 1;
                }
            }
            Err(e) => {
                warn!(index, college = %record.college_name, "Error inserting record: {}", e);
                summary.failures.push(RecordFailure {
                    index,
                    college_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        total = summary.total_records,
        added = summary.added_records,
        duplicates = summary.duplicate_records,
        failed = summary.failures.len(),
        colleges = summary.colleges.len(),
        "Persistence finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn raw(college: &str, branch: &str, category: Option<&str>, percentile: f64) -> ExtractedRecord {
        ExtractedRecord {
            college_name: Some(college.to_string()),
            branch_name: Some(branch.to_string()),
            category: category.map(str::to_string),
            percentile: Some(percentile),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_record_skipped_not_fatal() {
        let pool = init_memory_pool().await.unwrap();
        let summary = persist_records(
            &pool,
            vec![
                raw("COEP", "Civil Engineering", Some("OPEN"), 91.2),
                raw("COEP", "Computer Engineering", None, 99.0),
                raw("VJTI", "Electrical Engineering", Some("OBC"), 88.4),
            ],
        )
        .await
        .unwrap();

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.added_records, 2);
        assert_eq!(summary.colleges, vec!["COEP", "VJTI"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].index, 1);
        assert!(summary.failures[0].reason.contains("category"));
        assert_eq!(cutoffs::count(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_counted_as_attempted() {
        let pool = init_memory_pool().await.unwrap();
        let record = raw("COEP", "Civil Engineering", Some("OPEN"), 91.2);

        let summary = persist_records(&pool, vec![record.clone(), record]).await.unwrap();

        assert_eq!(summary.added_records, 2);
        assert_eq!(summary.duplicate_records, 1);
        assert_eq!(cutoffs::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_percentile_rejected() {
        let pool = init_memory_pool().await.unwrap();
        let summary = persist_records(&pool, vec![raw("COEP", "Civil", Some("OPEN"), 140.0)])
            .await
            .unwrap();

        assert_eq!(summary.added_records, 0);
        assert_eq!(summary.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_json_shape() {
        let summary = PersistenceSummary {
            total_records: 1,
            added_records: 1,
            colleges: vec!["COEP".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalRecords"], 1);
        assert_eq!(json["addedRecords"], 1);
        assert_eq!(json["colleges"][0], "COEP");
        assert!(json["failures"].as_array().unwrap().is_empty());
    }
}
