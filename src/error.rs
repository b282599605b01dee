//! Crate-wide error taxonomy.
//!
//! Mirrors the style of [`crate::validation::PathValidationError`]: one
//! `thiserror` variant per failure mode, each carrying a stable error code
//! from [`crate::error_codes`] for log correlation and documentation.

use std::path::PathBuf;
use thiserror::Error;

use crate::error_codes::*;
use crate::validation::PathValidationError;

/// Top-level error type returned by the reconciliation engine and its
/// surrounding adapters.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("[{}] invalid update path {path:?}: {reason}", SYNC_TREE_001_INVALID_PATH)]
    InvalidPath { path: String, reason: String },

    #[error(
        "[{}] update path {update_path:?} does not match routed node {node_path:?}",
        SYNC_TREE_002_PATH_MISMATCH
    )]
    PathMismatch {
        update_path: String,
        node_path: String,
    },

    #[error("[{}] no such task: {name}", SYNC_TASK_001_NO_SUCH_TASK)]
    NoSuchTask { name: String },

    #[error("[{}] producer {name} failed: {source}", SYNC_TASK_002_PRODUCER_FAILURE)]
    ProducerFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("[{}] protocol violation from peer: {reason}", SYNC_PROTO_001_VIOLATION)]
    ProtocolViolation { reason: String },

    #[error("[{}] filesystem adapter failure at {path:?}: {source}", SYNC_IO_001_ADAPTER_FAILURE)]
    AdapterFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    PathValidation(#[from] PathValidationError),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Stable error code for this variant, for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::InvalidPath { .. } => SYNC_TREE_001_INVALID_PATH,
            SyncError::PathMismatch { .. } => SYNC_TREE_002_PATH_MISMATCH,
            SyncError::NoSuchTask { .. } => SYNC_TASK_001_NO_SUCH_TASK,
            SyncError::ProducerFailure { .. } => SYNC_TASK_002_PRODUCER_FAILURE,
            SyncError::ProtocolViolation { .. } => SYNC_PROTO_001_VIOLATION,
            SyncError::AdapterFailure { .. } => SYNC_IO_001_ADAPTER_FAILURE,
            SyncError::PathValidation(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_message_contains_code() {
        let err = SyncError::InvalidPath {
            path: "/a/b".to_string(),
            reason: "leading slash".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains(SYNC_TREE_001_INVALID_PATH));
        assert_eq!(err.code(), SYNC_TREE_001_INVALID_PATH);
    }

    #[test]
    fn test_no_such_task_code() {
        let err = SyncError::NoSuchTask {
            name: "watcher".to_string(),
        };
        assert_eq!(err.code(), SYNC_TASK_001_NO_SUCH_TASK);
    }

    #[test]
    fn test_path_validation_conversion() {
        let inner = PathValidationError::OutsideRoot(
            "/etc/passwd".to_string(),
            "/srv/sync".to_string(),
        );
        let err: SyncError = inner.into();
        assert!(matches!(err, SyncError::PathValidation(_)));
    }
}
