//! The single-threaded decision engine: drains a merged inbox of `Update`s,
//! mutates the `UpdateTree`, and emits outbound `Update`s (to the peer) and
//! filesystem commands (to the local writer).

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use crate::error::SyncResult;
use crate::fs_adapter::FsAdapter;
use crate::path_rules::PathRules;
use crate::tree::{path_type, NodeRef, PathType, UpdateTree};
use crate::update::{InboxItem, Side, Update};

/// A mutation the filesystem-writer worker must apply to the local side.
#[derive(Debug, Clone, PartialEq)]
pub enum FsCommand {
    Write { path: String, data: Vec<u8>, mod_time: i64 },
    Mkdir { path: String },
    Delete { path: String },
    Mklink { path: String, target: String },
}

/// Owns the `UpdateTree` and drives the reconcile loop. Confined to a
/// single thread by convention: nothing else touches the tree.
pub struct Reconciler<F: FsAdapter> {
    tree: UpdateTree,
    root: PathBuf,
    fs: F,
    inbox: Receiver<InboxItem>,
    outbound: SyncSender<Update>,
    fs_commands: SyncSender<FsCommand>,
    flush_idle: Duration,
    local_scan_done: bool,
    remote_scan_done: bool,
    last_applied_was_gitignore: bool,
}

impl<F: FsAdapter> Reconciler<F> {
    pub fn new(
        root: PathBuf,
        fs: F,
        extra_excludes: PathRules,
        extra_includes: PathRules,
        inbox: Receiver<InboxItem>,
        outbound: SyncSender<Update>,
        fs_commands: SyncSender<FsCommand>,
        flush_idle_ms: u64,
    ) -> Self {
        Reconciler {
            tree: UpdateTree::new(extra_excludes, extra_includes),
            root,
            fs,
            inbox,
            outbound,
            fs_commands,
            flush_idle: Duration::from_millis(flush_idle_ms),
            local_scan_done: false,
            remote_scan_done: false,
            last_applied_was_gitignore: false,
        }
    }

    pub fn tree(&self) -> &UpdateTree {
        &self.tree
    }

    /// Drain the inbox, applying each `Update` to the tree as it arrives.
    /// Once both initial-scan sentinels have arrived, `flush()` runs after
    /// the inbox has gone quiet for `flush_idle` -- so a burst of updates is
    /// coalesced into one walk rather than one per item. A `.gitignore`
    /// update flushes immediately instead of waiting out the idle window,
    /// since it can retroactively change `should_ignore` for nodes already
    /// visited. Returns once the inbox disconnects (session end), flushing
    /// once more first so nothing queued is lost.
    pub fn run(&mut self) -> SyncResult<()> {
        loop {
            match self.inbox.recv_timeout(self.flush_idle) {
                Ok(item) => {
                    self.apply(item)?;
                    self.drain_available()?;
                    if self.last_applied_was_gitignore {
                        self.flush();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.local_scan_done && self.remote_scan_done {
                        self.flush();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    return Ok(());
                }
            }
        }
    }

    /// Non-blocking drain: apply every `Update` currently queued without
    /// waiting for more, so a burst of updates is handled as one batch.
    fn drain_available(&mut self) -> SyncResult<()> {
        while let Ok(item) = self.inbox.try_recv() {
            self.apply(item)?;
        }
        Ok(())
    }

    fn apply(&mut self, item: InboxItem) -> SyncResult<()> {
        match item {
            InboxItem::Update { side: Side::Local, update } => {
                self.last_applied_was_gitignore = update.is_gitignore();
                self.tree.add_local(update)?;
            }
            InboxItem::Update { side: Side::Remote, update } => {
                self.last_applied_was_gitignore = update.is_gitignore();
                self.tree.add_remote(update)?;
            }
            InboxItem::ScanDone(done) => match done.0 {
                Side::Local => self.local_scan_done = true,
                Side::Remote => self.remote_scan_done = true,
            },
        }
        Ok(())
    }

    fn flush(&mut self) {
        let mut outbound_updates = Vec::new();
        let mut fs_commands = Vec::new();
        self.tree.visit_dirty(|node| {
            if self.tree.should_ignore(node) {
                return;
            }
            decide(node, &self.tree, &self.root, &self.fs, &mut outbound_updates, &mut fs_commands);
        });
        for update in outbound_updates {
            let _ = self.outbound.send(update);
        }
        for command in fs_commands {
            let _ = self.fs_commands.send(command);
        }
    }
}

/// Per-node decision: transforms dirty tree state into outbound `Update`s
/// and filesystem commands. A node only reaches here if it is dirty and
/// not ignored.
fn decide<F: FsAdapter>(
    node: &NodeRef,
    tree: &UpdateTree,
    root: &Path,
    fs: &F,
    outbound: &mut Vec<Update>,
    fs_commands: &mut Vec<FsCommand>,
) {
    let (local, remote, path, is_same_type, is_local_newer, is_remote_newer) = {
        let b = node.borrow();
        (
            b.local().cloned(),
            b.remote().cloned(),
            b.path().to_string(),
            b.is_same_type(),
            b.is_local_newer(),
            b.is_remote_newer(),
        )
    };

    if local.is_none() && remote.is_none() {
        // Unreachable: the node only exists because an Update landed.
        return;
    }

    if !is_same_type {
        if is_remote_newer {
            let remote = remote.expect("remote present: is_remote_newer");
            fs_commands.push(FsCommand::Delete { path: path.clone() });
            apply_winner_to_fs(&path, &remote, fs, root, fs_commands);
            tree.snapshot_local_from_remote(node);
        } else if is_local_newer {
            let local = local.expect("local present: is_local_newer");
            outbound.push(Update::tombstone(path.clone(), local.mod_time));
            outbound.push(materialize_outbound(&path, &local, fs, root));
            tree.snapshot_remote_from_local(node);
        }
        return;
    }

    if is_local_newer {
        let local = local.expect("local present: is_local_newer");
        if local.delete {
            outbound.push(Update::tombstone(path.clone(), local.mod_time));
        } else {
            outbound.push(materialize_outbound(&path, &local, fs, root));
        }
        tree.snapshot_remote_from_local(node);
    } else if is_remote_newer {
        let remote = remote.expect("remote present: is_remote_newer");
        if remote.delete {
            fs_commands.push(FsCommand::Delete { path: path.clone() });
        } else {
            apply_winner_to_fs(&path, &remote, fs, root, fs_commands);
        }
        tree.snapshot_local_from_remote(node);
    }
    // Equal mod_times: agreed, nothing to do. Directory nodes with no
    // content difference fall through here too -- the walk still
    // descends into children regardless of this node's decision.
}

fn materialize_outbound<F: FsAdapter>(path: &str, local: &Update, fs: &F, root: &Path) -> Update {
    if path_type(local) == PathType::File {
        if let Ok((data, _)) = fs.read(root, path) {
            return local.clone().with_data(data);
        }
    }
    local.clone()
}

fn apply_winner_to_fs<F: FsAdapter>(
    path: &str,
    winner: &Update,
    fs: &F,
    root: &Path,
    fs_commands: &mut Vec<FsCommand>,
) {
    match path_type(winner) {
        PathType::Directory => fs_commands.push(FsCommand::Mkdir { path: path.to_string() }),
        PathType::Symlink => fs_commands.push(FsCommand::Mklink {
            path: path.to_string(),
            target: winner.symlink.clone(),
        }),
        PathType::File => {
            let data = winner
                .data
                .clone()
                .or_else(|| fs.read(root, path).ok().map(|(d, _)| d))
                .unwrap_or_default();
            fs_commands.push(FsCommand::Write {
                path: path.to_string(),
                data,
                mod_time: winner.mod_time,
            });
        }
    }
}
