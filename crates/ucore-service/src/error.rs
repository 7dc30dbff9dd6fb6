//! Service error types with mapping from the core and storage layers.

use ucore_core::CoreError;
use ucore_storage::StorageError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A task or resource was not in the state the operation expects.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timed out after {seconds:.3}s")]
    TimedOut { seconds: f64 },
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::VertexNotFound { .. }
            | CoreError::EdgeNotFound { .. }
            | CoreError::TreeNodeNotFound { .. } => ServiceError::NotFound(err.to_string()),
            CoreError::Validation { .. } => ServiceError::BadRequest(err.to_string()),
            CoreError::InvariantViolation { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Core(core) => core.into(),
            StorageError::GraphNotFound(_) => ServiceError::NotFound(err.to_string()),
            StorageError::Parse { .. } | StorageError::NoCandidate { .. } => {
                ServiceError::BadRequest(err.to_string())
            }
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucore_core::VertexId;

    #[test]
    fn core_errors_map_by_kind() {
        let missing: ServiceError = CoreError::VertexNotFound { id: VertexId(3) }.into();
        assert!(matches!(missing, ServiceError::NotFound(_)));
        let invalid: ServiceError = CoreError::Validation {
            reason: "bad".into(),
        }
        .into();
        assert!(matches!(invalid, ServiceError::BadRequest(_)));
    }

    #[test]
    fn storage_errors_unwrap_core() {
        let err: ServiceError = StorageError::Core(CoreError::EdgeNotFound {
            u: VertexId(0),
            v: VertexId(1),
        })
        .into();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let parse: ServiceError = StorageError::Parse {
            line: 2,
            reason: "x".into(),
        }
        .into();
        assert!(matches!(parse, ServiceError::BadRequest(_)));
    }
}
