//! External PDF extraction process
//!
//! The extractor is an opaque program invoked as
//! `<program> <args...> <input.pdf> <output.json>`. While it runs it prints
//! `PROGRESS:<0-100>` lines on stdout; on success it exits 0 after writing a
//! JSON array of record-shaped objects to the output path. On failure it
//! exits nonzero with diagnostics on stderr. Failure is decided by the exit
//! status alone, never by anything printed on stdout.

use cutoff_common::config::ServerConfig;
use cutoff_common::events::{ProgressChannel, ProgressEvent};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::ExtractedRecord;

static PROGRESS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PROGRESS:(\d+)").expect("progress marker pattern is valid"));

/// Longest stderr excerpt carried in errors and progress events
const MAX_STDERR_CHARS: usize = 4000;

/// Extraction failures
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The program could not be started
    #[error("Failed to start extractor '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited nonzero
    #[error(
        "Extraction process failed with code {}: {stderr}",
        .code.map_or_else(|| "none".to_string(), |c| c.to_string())
    )]
    Process { code: Option<i32>, stderr: String },

    /// Exit 0 but the output is missing, unreadable or an empty array
    #[error("No valid data found in processed output: {0}")]
    Empty(String),

    /// The program ran past the configured timeout and was killed
    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the program's output streams failed
    #[error("IO error while running extractor: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Status line shown to the operator for this failure
    pub fn status_text(&self) -> &'static str {
        match self {
            ExtractionError::Empty(_) => "Error: No valid data found in PDF",
            ExtractionError::Timeout(_) => "Error: Extraction timed out",
            _ => "Error processing PDF",
        }
    }
}

/// Counts over the raw extraction output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub total_records: usize,
    /// Distinct non-blank college names, in order of first appearance
    pub colleges: Vec<String>,
}

/// Successful extraction
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<ExtractedRecord>,
    pub stats: ExtractionStats,
}

/// Parse a `PROGRESS:<n>` marker from one stdout line
///
/// Values above 100 are ignored.
pub fn parse_progress_marker(line: &str) -> Option<u8> {
    PROGRESS_MARKER
        .captures(line)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .filter(|p| *p <= 100)
}

/// Progress event for a marker value
///
/// 100 from the extractor means its own work is done; the job is not
/// complete until the records are stored, so it is reported as 99.
pub fn marker_event(progress: u8) -> ProgressEvent {
    match progress {
        0..=50 => ProgressEvent::new(progress, format!("Extracting text from PDF ({}%)", progress)),
        51..=99 => ProgressEvent::new(progress, format!("Parsing data ({}%)", progress)),
        _ => ProgressEvent::new(99, "Finalizing..."),
    }
}

/// Runs the extraction program for uploaded files
#[derive(Debug, Clone)]
pub struct ExtractionInvoker {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl ExtractionInvoker {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.extractor_program.clone(),
            config.extractor_args.clone(),
            config.extraction_tmp_dir(),
            config.extraction_timeout,
        )
    }

    /// Per-job output path, so concurrent jobs never share a file
    pub fn output_path(&self, job_id: Uuid) -> PathBuf {
        self.output_dir.join(format!("{}.json", job_id))
    }

    /// Extract records from `input`, publishing progress for `job_id`
    ///
    /// Publishes marker progress only; failure and completion events are
    /// left to the caller.
    pub async fn run(
        &self,
        input: &Path,
        job_id: Uuid,
        progress: &ProgressChannel,
    ) -> Result<Extraction, ExtractionError> {
        let output_path = self.output_path(job_id);
        tokio::fs::create_dir_all(&self.output_dir).await?;

        progress.publish(job_id, ProgressEvent::new(0, "Starting PDF processing..."));

        let result = self.execute(input, &output_path, job_id, progress).await;
        remove_output(&output_path).await;
        result
    }

    async fn execute(
        &self,
        input: &Path,
        output_path: &Path,
        job_id: Uuid,
        progress: &ProgressChannel,
    ) -> Result<Extraction, ExtractionError> {
        info!(
            job_id = %job_id,
            input = %input.display(),
            output = %output_path.display(),
            "Starting extraction process"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain stderr concurrently so a chatty extractor never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    warn!("Failed to read extractor stderr: {}", e);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });
        let stdout = child.stdout.take();

        let run = async {
            if let Some(stdout) = stdout {
                // Raw lines: stray non-UTF-8 output must not fail the run
                let mut lines = BufReader::new(stdout).split(b'\n');
                while let Some(raw) = lines.next_segment().await? {
                    let line = String::from_utf8_lossy(&raw);
                    debug!(job_id = %job_id, "extractor: {}", line.trim_end());
                    if let Some(value) = parse_progress_marker(&line) {
                        progress.publish(job_id, marker_event(value));
                    }
                }
            }
            child.wait().await
        };

        let status = match tokio::time::timeout(self.timeout, run).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(job_id = %job_id, timeout = ?self.timeout, "Extractor timed out, killing it");
                if let Err(e) = child.kill().await {
                    warn!(job_id = %job_id, "Failed to kill extractor: {}", e);
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Err(ExtractionError::Timeout(self.timeout));
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            warn!(job_id = %job_id, code = ?status.code(), "Extractor failed: {}", stderr.trim());
            return Err(ExtractionError::Process {
                code: status.code(),
                stderr: tail(stderr.trim(), MAX_STDERR_CHARS),
            });
        }
        if !stderr.trim().is_empty() {
            debug!(job_id = %job_id, "Extractor stderr: {}", stderr.trim());
        }

        let records = read_output(output_path).await?;
        let stats = compute_stats(&records);
        info!(
            job_id = %job_id,
            records = stats.total_records,
            colleges = stats.colleges.len(),
            "Extraction finished"
        );

        Ok(Extraction { records, stats })
    }
}

/// Read the output file as a non-empty JSON array
///
/// Array elements that are not objects become all-empty records and are
/// rejected later by validation.
async fn read_output(path: &Path) -> Result<Vec<ExtractedRecord>, ExtractionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::Empty(format!("cannot read {}: {}", path.display(), e)))?;

    let values: Vec<Value> = serde_json::from_slice(&bytes)
        .map_err(|e| ExtractionError::Empty(format!("output is not a JSON array: {}", e)))?;

    if values.is_empty() {
        return Err(ExtractionError::Empty("output array is empty".to_string()));
    }

    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

fn compute_stats(records: &[ExtractedRecord]) -> ExtractionStats {
    let mut colleges: Vec<String> = Vec::new();
    for name in records
        .iter()
        .filter_map(|r| r.college_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        if !colleges.iter().any(|c| c == name) {
            colleges.push(name.to_string());
        }
    }
    ExtractionStats {
        total_records: records.len(),
        colleges,
    }
}

async fn remove_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed extraction output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove extraction output {}: {}", path.display(), e),
    }
}

/// Last `max` characters of `text`
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        text.to_string()
    } else {
        text.chars().skip(count - max).collect()
    }
}
