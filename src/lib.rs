//! duplexd: a bidirectional directory-sync reconciliation engine.
//!
//! The core is transport- and filesystem-agnostic: [`reconciler::Reconciler`]
//! drives a single [`tree::UpdateTree`] from a merged inbox of local and
//! remote [`update::Update`]s and emits outbound updates plus
//! [`reconciler::FsCommand`]s, leaving I/O to the [`fs_adapter::FsAdapter`]
//! and [`transport::PeerConnection`] seams. [`session::SessionCoordinator`]
//! wires the whole thing into a running session; `cli`/`main` are the binary
//! entrypoint built on top of the library.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod error_codes;
pub mod fs_adapter;
pub mod path_rules;
pub mod reconciler;
pub mod session;
pub mod task_runner;
pub mod transport;
pub mod tree;
pub mod update;
pub mod validation;
pub mod version;
