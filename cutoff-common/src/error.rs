//! Errors shared by the cutoff predictor crates
//!
//! Only failures that cross the crate boundary live here: the store, the
//! filesystem (uploads, snapshot, config file) and configuration. Request
//! validation errors belong to the HTTP layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The cutoff store rejected or could not run a query
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad bind address, unparsable TOML or environment value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else, e.g. a snapshot that failed to serialize
    #[error("Internal error: {0}")]
    Internal(String),
}
