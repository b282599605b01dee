//! Configuration surface injected into `UpdateTree`/`SessionCoordinator`.
//!
//! Grounded on the teacher's `WatcherConfig`: a plain struct with a
//! `Default` impl carrying the same field-default shape (root path,
//! debounce delay).

use std::path::PathBuf;

use crate::path_rules::{PathRules, DEFAULT_EXCLUDES, DEFAULT_INCLUDES};

/// Session-wide configuration, built by the CLI or a library caller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local sync root.
    pub root: PathBuf,
    /// The loopback demo's "remote" root -- stands in for a real peer
    /// address until a production transport exists.
    pub mirror_root: Option<PathBuf>,
    /// Debounce delay in milliseconds, matching the teacher's
    /// `WatcherConfig::debounce_ms` default.
    pub debounce_ms: u64,
    /// Extra exclude patterns, merged with the compiled-in defaults.
    pub extra_excludes: Vec<String>,
    /// Extra include patterns, merged with the compiled-in defaults.
    pub extra_includes: Vec<String>,
    /// How long the reconciler waits for the inbox to go quiet before
    /// running `visit_dirty`.
    pub flush_idle_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            root: PathBuf::from("."),
            mirror_root: None,
            debounce_ms: 500,
            extra_excludes: Vec::new(),
            extra_includes: Vec::new(),
            flush_idle_ms: 200,
        }
    }
}

impl SyncConfig {
    /// Compile this config's excludes/includes, merged with the
    /// compile-time defaults.
    pub fn compile_rules(&self) -> (PathRules, PathRules) {
        let anchor = std::path::Path::new("");
        let excludes = DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(self.extra_excludes.iter().map(|s| s.as_str()))
            .collect::<Vec<_>>();
        let includes = DEFAULT_INCLUDES
            .iter()
            .copied()
            .chain(self.extra_includes.iter().map(|s| s.as_str()))
            .collect::<Vec<_>>();
        (
            PathRules::from_lines(anchor, excludes),
            PathRules::from_lines(anchor, includes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_teacher_shape() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.debounce_ms, 500);
        assert_eq!(cfg.root, PathBuf::from("."));
        assert!(cfg.mirror_root.is_none());
    }

    #[test]
    fn test_compile_rules_merges_extra_excludes_with_defaults() {
        let mut cfg = SyncConfig::default();
        cfg.extra_excludes.push("*.bak".to_string());
        let (excludes, _includes) = cfg.compile_rules();
        assert!(excludes.should_ignore(std::path::Path::new("target"), true));
        assert!(excludes.should_ignore(std::path::Path::new("notes.bak"), false));
        assert!(!excludes.should_ignore(std::path::Path::new("src"), true));
    }
}
