//! Stable error codes for duplexd.
//!
//! Error codes follow the pattern: SYNC-{CATEGORY}-{3-digit number}
//!
//! Categories (1-4 uppercase letters):
//! - TREE: UpdateTree invariant/argument errors
//! - TASK: TaskRunner supervision errors
//! - PROTO: peer protocol violations
//! - IO: filesystem adapter errors
//!
//! Each error code is stable and should not be reused.

/// Path starts or ends with `/`, or embeds `..` escaping the sync root.
pub const SYNC_TREE_001_INVALID_PATH: &str = "SYNC-TREE-001";

/// An Update's embedded path disagrees with the node it was routed to.
pub const SYNC_TREE_002_PATH_MISMATCH: &str = "SYNC-TREE-002";

/// `stop_task` was called for an identity that was never started.
pub const SYNC_TASK_001_NO_SUCH_TASK: &str = "SYNC-TASK-001";

/// A worker's underlying I/O failed and its `on_failure` hook fired.
pub const SYNC_TASK_002_PRODUCER_FAILURE: &str = "SYNC-TASK-002";

/// Peer sent a malformed Update (missing path, contradictory flags, etc.).
pub const SYNC_PROTO_001_VIOLATION: &str = "SYNC-PROTO-001";

/// Filesystem adapter could not complete a read/write/mkdir/delete/mklink.
pub const SYNC_IO_001_ADAPTER_FAILURE: &str = "SYNC-IO-001";
