//! Error types for lab-runner
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// lab-runner error types
#[derive(Error, Debug)]
pub enum Error {
    /// Runner or trainer is not set up correctly (missing trainer, double allocation, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown dataset split requested
    #[error("Unknown dataset split '{0}' (expected one of: train, valid, test)")]
    InvalidSplit(String),

    /// Data failed an integrity check (misaligned rows, corrupt checkpoint tables)
    #[error("Data integrity violation: {0}\nRefusing to continue on misaligned or corrupt data.")]
    DataIntegrity(String),

    /// Output directory allocation gave up after the retry cap
    #[error("Could not allocate output directory for {base} after {attempts} attempts\nClean up stale runs or raise max_suffix_attempts.")]
    DirectoryExhausted {
        /// Base path that kept colliding
        base: PathBuf,
        /// Number of attempts made
        attempts: u32,
    },

    /// Invalid argument to a generator or utility
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Table file or archive error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Matrix shape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON (config or archive) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
