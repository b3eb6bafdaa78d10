//! Extraction progress events and the progress channel
//!
//! The [`ProgressChannel`] is the process-wide job registry. It keeps the
//! latest [`ProgressEvent`] of every upload job and broadcasts each publish to
//! all subscribers over a `tokio::sync::broadcast` channel. Subscribers filter
//! by job id.
//!
//! Per job the channel guarantees:
//! - events reach subscribers in publish order
//! - progress never decreases (lower values are raised to the last one)
//! - exactly one terminal event; later publishes are dropped

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Status reported for jobs the registry has not seen
pub const WAITING_STATUS: &str = "Waiting to start...";

/// Progress of one extraction job as sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Percentage complete (0-100)
    pub progress: u8,
    /// Human-readable phase description
    pub status_text: String,
    /// Present only when the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ProgressEvent {
    /// Progress update; values above 100 are clamped
    pub fn new(progress: u8, status_text: impl Into<String>) -> Self {
        Self {
            progress: progress.min(100),
            status_text: status_text.into(),
            error_text: None,
        }
    }

    /// Failure event. Progress is left at whatever the job had reached.
    pub fn failed(status_text: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            progress: 0,
            status_text: status_text.into(),
            error_text: Some(error_text.into()),
        }
    }

    /// Default state for unknown jobs
    pub fn waiting() -> Self {
        Self::new(0, WAITING_STATUS)
    }

    /// Completed (progress 100) or failed
    pub fn is_terminal(&self) -> bool {
        self.progress >= 100
            || self
                .error_text
                .as_deref()
                .is_some_and(|e| !e.trim().is_empty())
    }
}

/// Broadcast envelope carrying the job id and per-job sequence number
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: Uuid,
    pub seq: u64,
    pub event: ProgressEvent,
}

/// Registry view of one job
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub source_file_path: Option<PathBuf>,
    pub event: ProgressEvent,
    pub finished: bool,
}

#[derive(Debug)]
struct JobEntry {
    latest: ProgressEvent,
    seq: u64,
    source_file_path: Option<PathBuf>,
    finished_at: Option<Instant>,
}

impl JobEntry {
    fn new(source_file_path: Option<PathBuf>, seq: u64) -> Self {
        Self {
            latest: ProgressEvent::waiting(),
            seq,
            source_file_path,
            finished_at: None,
        }
    }
}

/// Publish/subscribe registry of upload job progress
pub struct ProgressChannel {
    jobs: Mutex<HashMap<Uuid, JobEntry>>,
    tx: broadcast::Sender<JobUpdate>,
}

impl ProgressChannel {
    /// Create a channel buffering up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            jobs: Mutex::new(HashMap::new()),
            tx,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<Uuid, JobEntry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a job and publish its opening event
    ///
    /// Re-opening a finished job starts a new run under the same id.
    /// Returns false, without touching the registry, while the job is running.
    pub fn open_job(
        &self,
        job_id: Uuid,
        source_file_path: Option<PathBuf>,
        status_text: impl Into<String>,
    ) -> bool {
        let mut jobs = self.registry();
        let next_seq = match jobs.get(&job_id) {
            Some(entry) if entry.finished_at.is_none() => return false,
            Some(entry) => entry.seq,
            None => 0,
        };

        let mut entry = JobEntry::new(source_file_path, next_seq);
        entry.seq += 1;
        entry.latest = ProgressEvent::new(0, status_text);
        let update = JobUpdate {
            job_id,
            seq: entry.seq,
            event: entry.latest.clone(),
        };
        jobs.insert(job_id, entry);
        let _ = self.tx.send(update);

        debug!(job_id = %job_id, "Job opened");
        true
    }

    /// Publish an event for a job
    ///
    /// Unknown jobs are registered on first publish. Returns false when the
    /// event was dropped because the job already reached a terminal state.
    pub fn publish(&self, job_id: Uuid, mut event: ProgressEvent) -> bool {
        let mut jobs = self.registry();
        let entry = jobs
            .entry(job_id)
            .or_insert_with(|| JobEntry::new(None, 0));

        if entry.finished_at.is_some() {
            debug!(job_id = %job_id, ?event, "Dropping event for finished job");
            return false;
        }

        event.progress = event.progress.max(entry.latest.progress);
        entry.seq += 1;
        entry.latest = event.clone();
        if event.is_terminal() {
            entry.finished_at = Some(Instant::now());
        }

        match self.tx.send(JobUpdate {
            job_id,
            seq: entry.seq,
            event,
        }) {
            Ok(receivers) => debug!(job_id = %job_id, receivers, "Progress event broadcast"),
            Err(_) => debug!(job_id = %job_id, "No subscribers for progress event"),
        }
        true
    }

    /// Publish a failure, leaving progress where the job had reached
    pub fn fail(
        &self,
        job_id: Uuid,
        status_text: impl Into<String>,
        error_text: impl Into<String>,
    ) -> bool {
        self.publish(job_id, ProgressEvent::failed(status_text, error_text))
    }

    /// Latest event for a job, or the waiting default when unknown
    pub fn latest(&self, job_id: Uuid) -> ProgressEvent {
        self.registry()
            .get(&job_id)
            .map(|entry| entry.latest.clone())
            .unwrap_or_else(ProgressEvent::waiting)
    }

    /// Registry view of a job, if known
    pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.registry().get(&job_id).map(|entry| JobSnapshot {
            job_id,
            source_file_path: entry.source_file_path.clone(),
            event: entry.latest.clone(),
            finished: entry.finished_at.is_some(),
        })
    }

    /// True while the job is registered and not yet terminal
    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.registry()
            .get(&job_id)
            .is_some_and(|entry| entry.finished_at.is_none())
    }

    /// Number of jobs currently held in the registry
    pub fn job_count(&self) -> usize {
        self.registry().len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Subscribe to one job
    ///
    /// The stream first yields the cached state (or the waiting default),
    /// then live events, and ends after the terminal event. Dropping the
    /// stream removes the subscription.
    pub fn subscribe(
        self: &Arc<Self>,
        job_id: Uuid,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        // Subscribing under the registry lock: no publish can slip between
        // reading the cached state and attaching the receiver.
        let (mut rx, initial, initial_seq) = {
            let jobs = self.registry();
            let rx = self.tx.subscribe();
            match jobs.get(&job_id) {
                Some(entry) => (rx, entry.latest.clone(), entry.seq),
                None => (rx, ProgressEvent::waiting(), 0),
            }
        };
        let channel = Arc::clone(self);

        async_stream::stream! {
            let mut last_seq = initial_seq;
            let mut done = initial.is_terminal();
            yield initial;

            while !done {
                match rx.recv().await {
                    Ok(update) => {
                        if update.job_id != job_id || update.seq <= last_seq {
                            continue;
                        }
                        last_seq = update.seq;
                        done = update.event.is_terminal();
                        yield update.event;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(job_id = %job_id, skipped, "Progress subscriber lagged, resyncing");
                        let cached = channel
                            .registry()
                            .get(&job_id)
                            .map(|entry| (entry.latest.clone(), entry.seq));
                        if let Some((event, seq)) = cached {
                            if seq > last_seq {
                                last_seq = seq;
                                done = event.is_terminal();
                                yield event;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Remove finished jobs older than `retention`; returns how many were removed
    pub fn sweep_expired(&self, retention: Duration) -> usize {
        let mut jobs = self.registry();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(finished) => finished.elapsed() < retention,
            None => true,
        });
        before - jobs.len()
    }

    /// Run [`Self::sweep_expired`] every `interval` until `shutdown` is cancelled
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Job registry sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.sweep_expired(retention);
                        if removed > 0 {
                            info!(removed, remaining = self.job_count(), "Swept expired upload jobs");
                        }
                    }
                }
            }
        })
    }
}
