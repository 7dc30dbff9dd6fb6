//! Core error types for ucore-core.
//!
//! Uses `thiserror` for structured, matchable variants covering input
//! validation, internal invariant breaks, and lookups of absent entities.

use crate::id::{TreeNodeId, VertexId};
use thiserror::Error;

/// Errors produced by the ucore-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input rejected before any computation started (malformed matrix,
    /// probability outside [0,1], self-loop, bad parameter).
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// An internal invariant broke, e.g. popping an empty priority queue.
    /// Indicates a logic error rather than bad input.
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// A vertex id outside `[0, n)`.
    #[error("vertex not found: VertexId({id})", id = id.0)]
    VertexNotFound { id: VertexId },

    /// The referenced vertex pair carries no edge.
    #[error("edge not found: ({u}, {v})")]
    EdgeNotFound { u: VertexId, v: VertexId },

    /// A tree node id that is absent or was absorbed by a merge.
    #[error("tree node not found: TreeNodeId({id})", id = id.0)]
    TreeNodeNotFound { id: TreeNodeId },
}

impl CoreError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        CoreError::Validation {
            reason: reason.into(),
        }
    }
}
