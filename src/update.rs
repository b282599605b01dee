//! The `Update` value object: the unit of metadata exchanged between the
//! local and remote sides of a sync session, and the wire schema a peer
//! depends on.

use serde::{Deserialize, Serialize};

/// Which side of a session an `Update` (or a tree slot) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

/// One unit of file/directory metadata (and optionally content) exchanged
/// between peers.
///
/// Field order and names are part of the wire schema: any transport that
/// serializes this type (JSON, length-prefixed binary, whatever replaces
/// `LoopbackTransport` in production) must round-trip it identically, so
/// this type carries no `#[serde(skip)]` or rename attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Slash-separated relative path from the sync root. Never starts or
    /// ends with `/`; the empty string denotes the root itself.
    pub path: String,
    /// Integer milliseconds, monotone within one machine's view of a file.
    pub mod_time: i64,
    pub directory: bool,
    /// Symlink target; empty iff this Update does not describe a symlink.
    pub symlink: String,
    /// Tombstone flag.
    pub delete: bool,
    /// Meaningful only when `path` ends in `.gitignore`: the file's rule text.
    pub ignore_string: String,
    /// Present only when transporting file contents.
    pub data: Option<Vec<u8>>,
}

impl Update {
    /// Build a plain file/directory Update with no symlink, delete, ignore
    /// text, or payload set.
    pub fn new(path: impl Into<String>, mod_time: i64, directory: bool) -> Self {
        Update {
            path: path.into(),
            mod_time,
            directory,
            symlink: String::new(),
            delete: false,
            ignore_string: String::new(),
            data: None,
        }
    }

    /// Build a tombstone Update. `mod_time` is typically `0`; the tree
    /// synthesizes the effective modtime (see `Node::set_local`/`set_remote`).
    pub fn tombstone(path: impl Into<String>, mod_time: i64) -> Self {
        Update {
            path: path.into(),
            mod_time,
            directory: false,
            symlink: String::new(),
            delete: true,
            ignore_string: String::new(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_symlink(mut self, target: impl Into<String>) -> Self {
        self.symlink = target.into();
        self
    }

    pub fn with_ignore_string(mut self, text: impl Into<String>) -> Self {
        self.ignore_string = text.into();
        self
    }

    pub fn is_symlink(&self) -> bool {
        !self.symlink.is_empty()
    }

    /// True iff this path names a `.gitignore` file (at any depth).
    pub fn is_gitignore(&self) -> bool {
        self.path.rsplit('/').next() == Some(".gitignore")
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

/// A control message signaling "all initial-scan Updates from this side
/// have been delivered". Kept out of `Update` itself rather than modeled as
/// a magic Update value, so the channel's item type carries the distinction
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialScanDone(pub Side);

/// The item type flowing through a producer -> reconciler channel.
#[derive(Debug, Clone)]
pub enum InboxItem {
    Update { side: Side, update: Update },
    ScanDone(InitialScanDone),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_new_defaults() {
        let u = Update::new("a/b.txt", 100, false);
        assert_eq!(u.path, "a/b.txt");
        assert!(!u.delete);
        assert!(!u.is_symlink());
        assert!(u.data.is_none());
    }

    #[test]
    fn test_tombstone_has_delete_flag() {
        let u = Update::tombstone("a/b.txt", 0);
        assert!(u.delete);
        assert_eq!(u.mod_time, 0);
    }

    #[test]
    fn test_is_gitignore() {
        assert!(Update::new("src/.gitignore", 1, false).is_gitignore());
        assert!(!Update::new("src/main.rs", 1, false).is_gitignore());
        assert!(Update::new(".gitignore", 1, false).is_gitignore());
    }

    #[test]
    fn test_is_root() {
        assert!(Update::new("", 0, true).is_root());
        assert!(!Update::new("a", 0, true).is_root());
    }

    #[test]
    fn test_serde_roundtrip_preserves_fields() {
        let u = Update::new("a/b.txt", 100, false)
            .with_data(vec![1, 2, 3])
            .with_ignore_string("*.log");
        let json = serde_json::to_string(&u).unwrap();
        let back: Update = serde_json::from_str(&json).unwrap();
        assert_eq!(u, back);
    }

    #[test]
    fn test_serde_field_names_are_stable() {
        let u = Update::new("x", 5, true);
        let json = serde_json::to_value(&u).unwrap();
        for field in [
            "path",
            "mod_time",
            "directory",
            "symlink",
            "delete",
            "ignore_string",
            "data",
        ] {
            assert!(json.get(field).is_some(), "missing field: {field}");
        }
    }
}
