//! # Cutoff Predictor Common Library
//!
//! Shared code for the cutoff predictor service:
//! - Error types
//! - Configuration loading and resolution
//! - Extraction progress events and the progress channel
//! - Admin session cookie encryption
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod sse;

pub use error::{Error, Result};
