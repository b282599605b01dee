//! Structured stderr diagnostics.
//!
//! This crate carries no `log`/`tracing` dependency, matching the teacher:
//! diagnostics are reported directly to stderr, structured through a
//! dedicated type rather than ad hoc format strings, so output stays
//! deterministic and machine-parseable if ever redirected to a JSON
//! stream.

use serde::{Deserialize, Serialize};

/// Why a path was excluded from sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IgnoreReason {
    Gitignore,
    ExtraExclude,
    NotExtraIncluded,
}

/// Which stage of the pipeline a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncStage {
    ApplyLocal,
    ApplyRemote,
    Decide,
    FsWrite,
    FsRead,
    Transport,
}

/// One diagnostic event. `sort_key` gives a deterministic total order for
/// stderr output, independent of the nondeterministic order concurrent
/// workers might otherwise report in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDiagnostic {
    Skipped { path: String, reason: IgnoreReason },
    Error { path: String, stage: SyncStage, message: String },
}

impl SyncDiagnostic {
    pub fn sort_key(&self) -> (u8, String) {
        match self {
            SyncDiagnostic::Skipped { path, reason } => (*reason as u8, path.clone()),
            SyncDiagnostic::Error { path, stage, .. } => (100 + *stage as u8, path.clone()),
        }
    }

    /// Render as a single human-readable line, matching the teacher's
    /// `eprintln!("WARNING: ...")` / `eprintln!("ERROR: ...")` convention.
    pub fn report(&self) {
        match self {
            SyncDiagnostic::Skipped { path, reason } => {
                eprintln!("duplexd: SKIP {path} ({reason:?})");
            }
            SyncDiagnostic::Error { path, stage, message } => {
                eprintln!("duplexd: ERROR [{stage:?}] {path}: {message}");
            }
        }
    }
}

/// Sort a batch of diagnostics by `sort_key` and report them in order, so
/// stderr output is deterministic regardless of which worker produced each
/// event first.
pub fn report_all(mut diagnostics: Vec<SyncDiagnostic>) {
    diagnostics.sort_by_key(|d| d.sort_key());
    for d in diagnostics {
        d.report();
    }
}
