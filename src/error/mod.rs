//! Error handling for cohort construction and model training.

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the cohort pipeline
#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    /// Error reading or writing a stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error opening a file, with the path that failed
    #[error("Failed to open {}: {source}", path.display())]
    FileAccess {
        /// File that could not be opened
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error reading or writing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error encoding or decoding a persisted model
    #[error("Model encoding error: {0}")]
    ModelEncoding(#[from] bincode::Error),

    /// A feature name or code could not be resolved through the catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// A column required by a stage is absent from the table
    #[error("Column '{0}' not found in table")]
    MissingColumn(String),

    /// Table layout does not match what an operation needs
    #[error("Schema error: {0}")]
    Schema(String),

    /// An operation was asked to do something its input cannot support
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CohortError {
    /// Attach a path to an IO error raised while opening a file
    pub fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Result type for cohort pipeline operations
pub type Result<T> = std::result::Result<T, CohortError>;
