//! Upload ingest pipeline: extraction → persistence → snapshot
//!
//! A run for one job waits for an extraction slot, invokes the extractor,
//! stores the valid records, mirrors the table to disk and finally publishes
//! the job's single progress=100 event. Every failure path publishes exactly
//! one error event, so every job reaches a terminal state.

use cutoff_common::events::{ProgressChannel, ProgressEvent};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::extractor::{ExtractionError, ExtractionInvoker};
use super::persistence::{persist_records, PersistenceSummary, RecordFailure};
use super::snapshot;

/// Status shown while a job waits for an extraction slot
pub const QUEUED_STATUS: &str = "Queued: waiting for an extraction slot";

/// Pipeline failures
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Extraction succeeded but no record passed validation
    #[error("No valid records in extracted data ({} rejected)", .failures.len())]
    NoValidRecords { failures: Vec<RecordFailure> },

    /// The store could not be reached
    #[error("Failed to save extracted data: {0}")]
    Store(#[from] cutoff_common::Error),

    /// The extraction slot pool was closed (shutdown)
    #[error("Extraction slots closed")]
    SlotsClosed,
}

impl IngestError {
    /// Status line published with the error event
    pub fn status_text(&self) -> &'static str {
        match self {
            IngestError::Extraction(e) => e.status_text(),
            IngestError::NoValidRecords { .. } => "Error: No valid data found in PDF",
            IngestError::Store(_) => "Error saving extracted data",
            IngestError::SlotsClosed => "Error: Server shutting down",
        }
    }

    /// True when the extractor ran but produced nothing usable
    pub fn is_empty_output(&self) -> bool {
        matches!(
            self,
            IngestError::Extraction(ExtractionError::Empty(_)) | IngestError::NoValidRecords { .. }
        )
    }
}

/// Fails the job if a run is dropped before reaching its terminal event
struct CancelGuard<'a> {
    progress: &'a ProgressChannel,
    job_id: Uuid,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(job_id = %self.job_id, "Ingest run cancelled before completion");
            self.progress.fail(
                self.job_id,
                "Error processing PDF",
                "Processing was cancelled before completion",
            );
        }
    }
}

/// Runs uploads through extraction and persistence
pub struct IngestPipeline {
    db: SqlitePool,
    progress: Arc<ProgressChannel>,
    invoker: ExtractionInvoker,
    slots: Arc<Semaphore>,
    snapshot_path: PathBuf,
}

impl IngestPipeline {
    pub fn new(
        db: SqlitePool,
        progress: Arc<ProgressChannel>,
        invoker: ExtractionInvoker,
        max_concurrent: usize,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            progress,
            invoker,
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn progress(&self) -> &Arc<ProgressChannel> {
        &self.progress
    }

    /// Run the pipeline for one job and wait for the outcome
    ///
    /// The job's terminal event (completion or error) is published before
    /// this returns.
    pub async fn run(&self, job_id: Uuid, source: &Path) -> Result<PersistenceSummary, IngestError> {
        let mut guard = CancelGuard {
            progress: &self.progress,
            job_id,
            armed: true,
        };
        let result = self.execute(job_id, source).await;
        guard.armed = false;
        match &result {
            Ok(summary) => {
                self.progress.publish(
                    job_id,
                    ProgressEvent::new(
                        100,
                        format!(
                            "Completed! Extracted {} records from {} colleges",
                            summary.added_records,
                            summary.colleges.len()
                        ),
                    ),
                );
            }
            Err(e) => {
                warn!(job_id = %job_id, "Ingest failed: {}", e);
                self.progress.fail(job_id, e.status_text(), e.to_string());
            }
        }
        result
    }

    async fn execute(&self, job_id: Uuid, source: &Path) -> Result<PersistenceSummary, IngestError> {
        let _permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.progress.publish(job_id, ProgressEvent::new(0, QUEUED_STATUS));
                Arc::clone(&self.slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| IngestError::SlotsClosed)?
            }
        };

        let extraction = self.invoker.run(source, job_id, &self.progress).await?;

        self.progress
            .publish(job_id, ProgressEvent::new(99, "Saving extracted data..."));
        let summary = persist_records(&self.db, extraction.records).await?;
        if summary.added_records == 0 {
            return Err(IngestError::NoValidRecords {
                failures: summary.failures,
            });
        }

        // The mirror is a convenience copy; the table is the source of truth
        if let Err(e) = snapshot::mirror_table(&self.db, &self.snapshot_path).await {
            warn!(job_id = %job_id, "Failed to write snapshot: {}", e);
        }

        info!(
            job_id = %job_id,
            added = summary.added_records,
            failed = summary.failures.len(),
            "Ingest completed"
        );
        Ok(summary)
    }

    /// Run the pipeline in the background
    ///
    /// The returned handle resolves once the job is terminal. A panic in
    /// the pipeline is turned into an error event for the job.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid, source: PathBuf) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let worker = tokio::spawn(async move {
            info!(job_id = %job_id, "Background ingest task started");
            let _ = pipeline.run(job_id, &source).await;
        });

        let progress = Arc::clone(&self.progress);
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(job_id = %job_id, "Background ingest task aborted: {}", e);
                progress.fail(job_id, "Error processing PDF", format!("Processing task failed: {}", e));
            }
        })
    }
}
