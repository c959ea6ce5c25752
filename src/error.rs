//! Error types for the reconciliation engine
//!
//! Scoring, ranking and batch matching never fail. Errors only come from the
//! edges: the pattern store, configuration files and record loaders.

use thiserror::Error;

/// Result type for fallible reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Pattern store failure (wraps rusqlite::Error)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record file could not be parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed stored or user-supplied data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
