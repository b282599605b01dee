//! Concrete filesystem adapter: scanning, watching, and mutating the local
//! side of a sync root.
//!
//! Grounded on the teacher's filesystem watcher: a dedicated OS thread runs
//! a `notify` recommended watcher wrapped in `notify_debouncer_mini`,
//! coalescing events over a debounce window into a deterministic,
//! lexicographically sorted batch before handing anything to the caller.
//! Scanning is a one-shot `walkdir::WalkDir` pass with `follow_links(false)`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use walkdir::WalkDir;

use crate::update::Update;
use crate::validation::{relative_update_path, validate_path_within_root, PathValidationError};

/// The filesystem interface the core depends on. The core only depends on
/// this trait; `LocalFsAdapter` is the one production implementation
/// shipped in this crate.
pub trait FsAdapter: Send + Sync {
    /// One-shot recursive walk emitting parent directories before children.
    fn scan(&self, root: &Path) -> Vec<Update>;

    /// Spawn a dedicated watcher thread; returns a channel of incremental
    /// `Update`s. The thread stops once `stop` is observed set.
    fn watch(&self, root: &Path, stop: Arc<AtomicBool>) -> Receiver<Update>;

    fn read(&self, root: &Path, path: &str) -> std::io::Result<(Vec<u8>, i64)>;
    fn write(&self, root: &Path, path: &str, data: &[u8], mod_time: i64) -> std::io::Result<()>;
    fn mkdir(&self, root: &Path, path: &str) -> std::io::Result<()>;
    fn delete(&self, root: &Path, path: &str) -> std::io::Result<()>;
    fn mklink(&self, root: &Path, path: &str, target: &str) -> std::io::Result<()>;
}

/// `FsAdapter` backed by `std::fs`, `walkdir`, and `notify`.
pub struct LocalFsAdapter {
    pub debounce: Duration,
}

impl LocalFsAdapter {
    pub fn new(debounce_ms: u64) -> Self {
        LocalFsAdapter {
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    fn resolve(&self, root: &Path, path: &str) -> PathBuf {
        if path.is_empty() {
            root.to_path_buf()
        } else {
            root.join(path)
        }
    }

    fn stat_to_update(path: &Path, root: &Path) -> Option<Update> {
        let rel = relative_update_path(path, root)?;
        match std::fs::symlink_metadata(path) {
            Ok(meta) => {
                let mod_time = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                if meta.file_type().is_symlink() {
                    let target = std::fs::read_link(path)
                        .ok()
                        .map(|t| t.to_string_lossy().to_string())
                        .unwrap_or_default();
                    Some(Update::new(rel, mod_time, false).with_symlink(target))
                } else if meta.is_dir() {
                    Some(Update::new(rel, mod_time, true))
                } else {
                    let ignore_string = if path.file_name().map(|n| n == ".gitignore").unwrap_or(false) {
                        std::fs::read_to_string(path).unwrap_or_default()
                    } else {
                        String::new()
                    };
                    Some(Update::new(rel, mod_time, false).with_ignore_string(ignore_string))
                }
            }
            Err(_) => Some(Update::tombstone(rel, 0)),
        }
    }
}

impl FsAdapter for LocalFsAdapter {
    fn scan(&self, root: &Path) -> Vec<Update> {
        let mut updates = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if validate_path_within_root(path, root).is_err() {
                continue;
            }
            if let Some(update) = Self::stat_to_update(path, root) {
                updates.push(update);
            }
        }
        updates
    }

    fn watch(&self, root: &Path, stop: Arc<AtomicBool>) -> Receiver<Update> {
        let (tx, rx) = mpsc::channel();
        let root = root.to_path_buf();
        let debounce = self.debounce;
        thread::spawn(move || {
            if let Err(e) = run_watch_loop(&root, debounce, stop, tx) {
                eprintln!("duplexd: watcher thread error: {e}");
            }
        });
        rx
    }

    fn read(&self, root: &Path, path: &str) -> std::io::Result<(Vec<u8>, i64)> {
        let full = self.resolve(root, path);
        validate_path_within_root(&full, root)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::PermissionDenied, e))?;
        let data = std::fs::read(&full)?;
        let mod_time = std::fs::symlink_metadata(&full)?
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok((data, mod_time))
    }

    fn write(&self, root: &Path, path: &str, data: &[u8], _mod_time: i64) -> std::io::Result<()> {
        let full = self.resolve(root, path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, data)
    }

    fn mkdir(&self, root: &Path, path: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.resolve(root, path))
    }

    fn delete(&self, root: &Path, path: &str) -> std::io::Result<()> {
        let full = self.resolve(root, path);
        match std::fs::symlink_metadata(&full) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&full),
            Ok(_) => std::fs::remove_file(&full),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn mklink(&self, root: &Path, path: &str, target: &str) -> std::io::Result<()> {
        let full = self.resolve(root, path);
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, &full)
        }
        #[cfg(not(unix))]
        {
            let _ = (full, target);
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "symlinks unsupported on this platform",
            ))
        }
    }
}

fn run_watch_loop(
    root: &Path,
    debounce: Duration,
    stop: Arc<AtomicBool>,
    tx: std::sync::mpsc::Sender<Update>,
) -> notify::Result<()> {
    let (batch_tx, batch_rx) = mpsc::channel();
    let root_for_cb = root.to_path_buf();
    let mut debouncer = new_debouncer(debounce, move |result| match result {
        Ok(events) => {
            let paths = collect_changed_paths(&events, &root_for_cb);
            if !paths.is_empty() {
                let _ = batch_tx.send(paths);
            }
        }
        Err(errors) => {
            for err in errors {
                eprintln!("duplexd: watch error: {err}");
            }
        }
    })?;
    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;

    while !stop.load(Ordering::SeqCst) {
        match batch_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(paths) => {
                for path in paths {
                    if let Some(update) = LocalFsAdapter::stat_to_update(&path, root) {
                        if tx.send(update).is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// Deterministic, lexicographically sorted set of changed paths from one
/// debounced batch of events. Paths outside `root` are rejected and logged
/// rather than silently dropped.
fn collect_changed_paths(
    events: &[notify_debouncer_mini::DebouncedEvent],
    root: &Path,
) -> BTreeSet<PathBuf> {
    let mut changed = BTreeSet::new();
    for event in events {
        let path = &event.path;
        match validate_path_within_root(path, root) {
            Ok(canonical) => {
                changed.insert(canonical);
            }
            Err(PathValidationError::CannotCanonicalize(_)) => {
                // Vanished path: still worth reporting as a delete candidate.
                changed.insert(path.clone());
            }
            Err(e) => {
                eprintln!("duplexd: watcher rejected {}: {e}", path.display());
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_emits_parent_before_child() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.txt"), b"hi").unwrap();

        let adapter = LocalFsAdapter::new(50);
        let updates = adapter.scan(dir.path());
        let a_idx = updates.iter().position(|u| u.path == "a").unwrap();
        let b_idx = updates.iter().position(|u| u.path == "a/b.txt").unwrap();
        assert!(a_idx < b_idx);
    }

    #[test]
    fn test_scan_matches_fs_ground_truth() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"data").unwrap();
        let adapter = LocalFsAdapter::new(50);
        let updates = adapter.scan(dir.path());
        let f = updates.iter().find(|u| u.path == "f.txt").unwrap();
        assert!(!f.directory);
        assert!(!f.delete);
    }

    #[test]
    fn test_read_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalFsAdapter::new(50);
        adapter.write(dir.path(), "f.txt", b"hello", 0).unwrap();
        let (data, _mtime) = adapter.read(dir.path(), "f.txt").unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_mkdir_and_delete() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalFsAdapter::new(50);
        adapter.mkdir(dir.path(), "sub").unwrap();
        assert!(dir.path().join("sub").is_dir());
        adapter.delete(dir.path(), "sub").unwrap();
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn test_watch_reports_created_file() {
        let dir = TempDir::new().unwrap();
        let adapter = LocalFsAdapter::new(50);
        let stop = Arc::new(AtomicBool::new(false));
        let rx = adapter.watch(dir.path(), stop.clone());

        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(dir.path().join("new.txt"), b"hi").unwrap();

        let update = rx.recv_timeout(Duration::from_secs(5));
        stop.store(true, Ordering::SeqCst);
        assert!(update.is_ok());
    }
}
