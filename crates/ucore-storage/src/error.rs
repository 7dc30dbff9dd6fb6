//! Storage error types for ucore-storage.

use thiserror::Error;
use ucore_core::CoreError;

/// Errors produced by ingestion and storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The graph model rejected the data.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An edge-list line could not be read. `line` is 1-based.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A graph with the given ID was not found.
    #[error("graph not found: {0}")]
    GraphNotFound(i64),

    /// A perturbation could not find a pair to change.
    #[error("no candidate edge: {reason}")]
    NoCandidate { reason: String },
}
