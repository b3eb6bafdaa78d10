//! Upload processing and query services

pub mod extractor;
pub mod ingest;
pub mod persistence;
pub mod predictor;
pub mod snapshot;

pub use extractor::{ExtractionError, ExtractionInvoker};
pub use ingest::{IngestError, IngestPipeline};
pub use persistence::{persist_records, PersistenceSummary};
