//! `.gitignore`-style rule compiler.
//!
//! Grounded on the `ignore` crate's `gitignore::GitignoreBuilder`, built
//! from in-memory lines via `add_line` rather than from a file on disk,
//! since rule text here arrives embedded in an `Update.ignore_string`
//! rather than living at a path we can hand to `Gitignore::new`.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// A compiled set of gitignore-style patterns, anchored to one directory.
///
/// Rule order matters: later patterns override earlier ones, and `!`
/// re-inclusion only resurrects a path an earlier pattern ignored. A
/// pattern that fails to parse is dropped; the rest of the set still
/// takes effect.
pub struct PathRules {
    compiled: Gitignore,
}

impl PathRules {
    /// An empty rule set: `should_ignore` always returns `false`.
    pub fn empty() -> Self {
        PathRules {
            compiled: Gitignore::empty(),
        }
    }

    /// Compile from a newline-delimited rule string, anchored at `root`.
    pub fn from_text(root: &Path, text: &str) -> Self {
        Self::from_lines(root, text.lines())
    }

    /// Compile from a variadic/iterator list of pattern lines.
    pub fn from_lines<'a, I: IntoIterator<Item = &'a str>>(root: &Path, lines: I) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            // A pattern that fails to parse is dropped rather than aborting
            // the whole set.
            let _ = builder.add_line(None, trimmed);
        }
        let compiled = builder.build().unwrap_or_else(|_| Gitignore::empty());
        PathRules { compiled }
    }

    /// Replace this rule set's patterns in place. Safe to call repeatedly.
    pub fn set_rules(&mut self, root: &Path, text: &str) {
        *self = Self::from_text(root, text);
    }

    /// Whether `rel_path` (relative to this rule set's anchor directory)
    /// is excluded. For a directory, the trailing-`/` pattern variant
    /// applies.
    pub fn should_ignore(&self, rel_path: &Path, is_directory: bool) -> bool {
        self.compiled
            .matched(rel_path, is_directory)
            .is_ignore()
    }
}

impl Default for PathRules {
    fn default() -> Self {
        Self::empty()
    }
}

/// Compile-time default excludes/includes layered on top of every
/// `UpdateTree`'s per-directory `.gitignore` rules: common build-output
/// directories, editor swap files, and dotfiles are excluded; a handful
/// of project metadata files are re-included.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "tmp",
    "temp",
    "target",
    "build",
    "bin",
    "*___jb_bak___",
    "*___jb_old___",
    ".*",
];

pub const DEFAULT_INCLUDES: &[&str] = &[".gitignore", "*.iml"];
