//! `UpdateTree`: the dual-view local+remote metadata tree the Reconciler
//! owns and mutates. Thread-confined by convention, not by a lock: only
//! the reconcile worker ever touches it (see `reconciler.rs`).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::error::SyncError;
use crate::path_rules::{PathRules, DEFAULT_EXCLUDES, DEFAULT_INCLUDES};
use crate::update::Update;

/// Coarse type of a path, derived from an `Update`'s flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Directory,
    Symlink,
    File,
}

pub fn path_type(u: &Update) -> PathType {
    if u.directory {
        PathType::Directory
    } else if !u.symlink.is_empty() {
        PathType::Symlink
    } else {
        PathType::File
    }
}

pub type NodeRef = Rc<RefCell<Node>>;

/// One vertex in the `UpdateTree`: a single path as seen from both sides.
pub struct Node {
    parent: Option<Weak<RefCell<Node>>>,
    name: String,
    path: String,
    children: BTreeMap<String, NodeRef>,
    local: Option<Update>,
    remote: Option<Update>,
    ignore_rules: PathRules,
    is_dirty: bool,
    has_dirty_descendant: bool,
    should_ignore_cache: Option<bool>,
}

impl Node {
    fn new_root() -> NodeRef {
        Rc::new(RefCell::new(Node {
            parent: None,
            name: String::new(),
            path: String::new(),
            children: BTreeMap::new(),
            local: None,
            remote: None,
            ignore_rules: PathRules::empty(),
            is_dirty: false,
            has_dirty_descendant: false,
            should_ignore_cache: None,
        }))
    }

    fn new_child(parent: &NodeRef, name: String) -> NodeRef {
        let parent_path = parent.borrow().path.clone();
        let path = if parent_path.is_empty() {
            name.clone()
        } else {
            format!("{parent_path}/{name}")
        };
        Rc::new(RefCell::new(Node {
            parent: Some(Rc::downgrade(parent)),
            name,
            path,
            children: BTreeMap::new(),
            local: None,
            remote: None,
            ignore_rules: PathRules::empty(),
            is_dirty: false,
            has_dirty_descendant: false,
            should_ignore_cache: None,
        }))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local(&self) -> Option<&Update> {
        self.local.as_ref()
    }

    pub fn remote(&self) -> Option<&Update> {
        self.remote.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn has_dirty_descendant(&self) -> bool {
        self.has_dirty_descendant
    }

    pub fn children(&self) -> impl Iterator<Item = &NodeRef> {
        self.children.values()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Remote present AND (local absent OR local older than remote).
    pub fn is_remote_newer(&self) -> bool {
        match &self.remote {
            None => false,
            Some(r) => match &self.local {
                None => true,
                Some(l) => l.mod_time < r.mod_time,
            },
        }
    }

    /// Local present AND (remote absent OR remote older than local).
    pub fn is_local_newer(&self) -> bool {
        match &self.local {
            None => false,
            Some(l) => match &self.remote {
                None => true,
                Some(r) => l.mod_time > r.mod_time,
            },
        }
    }

    /// `true` when both sides are present but describe different path types.
    pub fn is_same_type(&self) -> bool {
        match (&self.local, &self.remote) {
            (Some(l), Some(r)) => path_type(l) == path_type(r),
            _ => true,
        }
    }

    fn drop_children(&mut self) {
        self.children.clear();
    }

    fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

fn synthesize_delete_modtime(previous: Option<&Update>, mut u: Update) -> Update {
    if u.delete && u.mod_time == 0 {
        if let Some(prev) = previous {
            let bump = if prev.delete { 0 } else { 1 };
            u.mod_time = prev.mod_time + bump;
        }
    }
    u
}

fn mark_ancestors_dirty_descendant(node: &NodeRef) {
    let mut current = node.borrow().parent();
    while let Some(n) = current {
        {
            let mut b = n.borrow_mut();
            if b.has_dirty_descendant {
                break;
            }
            b.has_dirty_descendant = true;
        }
        current = n.borrow().parent();
    }
}

fn invalidate_ignore_cache_subtree(node: &NodeRef) {
    let mut stack = vec![node.clone()];
    while let Some(n) = stack.pop() {
        n.borrow_mut().should_ignore_cache = None;
        for child in n.borrow().children.values() {
            stack.push(child.clone());
        }
    }
}

/// The dual-view local+remote metadata tree.
///
/// Owns the root [`Node`] (a directory with empty path) plus two
/// process-wide [`PathRules`] (`extra_excludes`, `extra_includes`) applied
/// on top of every directory's own tree-local `.gitignore` rules.
pub struct UpdateTree {
    root: NodeRef,
    extra_excludes: PathRules,
    extra_includes: PathRules,
}

impl UpdateTree {
    pub fn new(extra_excludes: PathRules, extra_includes: PathRules) -> Self {
        UpdateTree {
            root: Node::new_root(),
            extra_excludes,
            extra_includes,
        }
    }

    /// Compile the tree's default excludes/includes (see
    /// [`crate::path_rules::DEFAULT_EXCLUDES`]/`DEFAULT_INCLUDES`).
    pub fn with_defaults() -> Self {
        let anchor = Path::new("");
        UpdateTree::new(
            PathRules::from_lines(anchor, DEFAULT_EXCLUDES.iter().copied()),
            PathRules::from_lines(anchor, DEFAULT_INCLUDES.iter().copied()),
        )
    }

    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    fn split_path(path: &str) -> Result<Vec<&str>, SyncError> {
        if path.is_empty() {
            return Ok(Vec::new());
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(SyncError::InvalidPath {
                path: path.to_string(),
                reason: "path must not start or end with '/'".to_string(),
            });
        }
        let components: Vec<&str> = path.split('/').collect();
        if components.iter().any(|c| *c == ".." || *c == ".") {
            return Err(SyncError::InvalidPath {
                path: path.to_string(),
                reason: "path must not contain '.' or '..' components".to_string(),
            });
        }
        Ok(components)
    }

    /// Resolve a path to its node, creating missing intermediates as empty
    /// placeholders. Producers promise parents arrive first, but the tree
    /// must tolerate reordering at startup.
    pub fn find(&self, path: &str) -> Result<NodeRef, SyncError> {
        let components = Self::split_path(path)?;
        let mut current = self.root.clone();
        for name in components {
            let next = {
                let existing = current.borrow().children.get(name).cloned();
                existing
            };
            current = match next {
                Some(n) => n,
                None => {
                    let child = Node::new_child(&current, name.to_string());
                    current.borrow_mut().children.insert(name.to_string(), child.clone());
                    child
                }
            };
        }
        Ok(current)
    }

    fn check_path_matches(node: &NodeRef, update: &Update) -> Result<(), SyncError> {
        let node_path = node.borrow().path.clone();
        if node_path != update.path {
            return Err(SyncError::PathMismatch {
                update_path: update.path.clone(),
                node_path,
            });
        }
        Ok(())
    }

    pub fn add_local(&self, u: Update) -> Result<(), SyncError> {
        let node = self.find(&u.path)?;
        Self::check_path_matches(&node, &u)?;
        self.set_local(&node, u);
        Ok(())
    }

    pub fn add_remote(&self, u: Update) -> Result<(), SyncError> {
        let node = self.find(&u.path)?;
        Self::check_path_matches(&node, &u)?;
        self.set_remote(&node, u);
        Ok(())
    }

    fn set_local(&self, node: &NodeRef, u: Update) {
        let previous = node.borrow().local.clone();
        let u = synthesize_delete_modtime(previous.as_ref(), u);
        let drop_children = !u.directory || u.delete;
        {
            let mut b = node.borrow_mut();
            b.local = Some(u);
            if drop_children {
                b.drop_children();
            }
            b.mark_dirty();
        }
        self.after_set(node);
    }

    fn set_remote(&self, node: &NodeRef, u: Update) {
        let previous = node.borrow().remote.clone();
        let u = synthesize_delete_modtime(previous.as_ref(), u);
        let drop_children = !u.directory || u.delete;
        {
            let mut b = node.borrow_mut();
            b.remote = Some(u);
            if drop_children {
                b.drop_children();
            }
            b.mark_dirty();
        }
        self.after_set(node);
    }

    fn after_set(&self, node: &NodeRef) {
        mark_ancestors_dirty_descendant(node);
        let name_is_gitignore = node.borrow().name == ".gitignore";
        if name_is_gitignore {
            if let Some(parent) = node.borrow().parent() {
                let newer_text = {
                    let b = node.borrow();
                    if b.is_remote_newer() {
                        b.remote.as_ref().map(|u| u.ignore_string.clone())
                    } else if b.is_local_newer() {
                        b.local.as_ref().map(|u| u.ignore_string.clone())
                    } else {
                        None
                    }
                };
                if let Some(text) = newer_text {
                    let anchor_path = parent.borrow().path.clone();
                    parent.borrow_mut().ignore_rules =
                        PathRules::from_text(Path::new(&anchor_path), &text);
                    invalidate_ignore_cache_subtree(&parent);
                }
            }
        }
    }

    /// Breadth-first walk over every node, root first.
    pub fn visit(&self, mut f: impl FnMut(&NodeRef)) {
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(self.root.clone());
        while let Some(node) = queue.pop_front() {
            f(&node);
            for child in node.borrow().children.values() {
                queue.push_back(child.clone());
            }
        }
    }

    /// Breadth-first walk pruned to ancestors of dirty nodes; invokes `f`
    /// on every dirty node encountered, then clears both dirty flags on
    /// every visited node.
    pub fn visit_dirty(&self, mut f: impl FnMut(&NodeRef)) {
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(self.root.clone());
        let mut visited = Vec::new();
        while let Some(node) = queue.pop_front() {
            let (is_dirty, has_dirty_descendant) = {
                let b = node.borrow();
                (b.is_dirty, b.has_dirty_descendant)
            };
            if !is_dirty && !has_dirty_descendant {
                continue;
            }
            if is_dirty {
                f(&node);
            }
            visited.push(node.clone());
            for child in node.borrow().children.values() {
                queue.push_back(child.clone());
            }
        }
        for node in visited {
            let mut b = node.borrow_mut();
            b.is_dirty = false;
            b.has_dirty_descendant = false;
        }
    }

    /// After a decision dispatches filesystem content to the peer, record
    /// that the peer's remote slot now mirrors local (without re-marking
    /// the node dirty, since the reconcile pass already owns this node).
    pub fn snapshot_remote_from_local(&self, node: &NodeRef) {
        let local = node.borrow().local.clone();
        node.borrow_mut().remote = local;
    }

    /// Symmetric to [`Self::snapshot_remote_from_local`]: record that the
    /// local slot now mirrors the value just written to the filesystem
    /// from remote.
    pub fn snapshot_local_from_remote(&self, node: &NodeRef) {
        let remote = node.borrow().remote.clone();
        node.borrow_mut().local = remote;
    }

    /// Effective ignore decision for `node`: OR together every ancestor's
    /// tree-local ignore rules and `extra_excludes`, AND NOT
    /// `extra_includes` (reused as an inclusion whitelist). Memoized on the
    /// node until an ancestor's rules change.
    pub fn should_ignore(&self, node: &NodeRef) -> bool {
        if let Some(cached) = node.borrow().should_ignore_cache {
            return cached;
        }
        let node_path = node.borrow().path.clone();
        let is_dir = node
            .borrow()
            .local
            .as_ref()
            .or(node.borrow().remote.as_ref())
            .map(|u| u.directory)
            .unwrap_or(false);

        let mut any_git_ignored = false;
        let mut ancestor = node.borrow().parent();
        while let Some(a) = ancestor {
            let (ancestor_path, has_rules) = {
                let b = a.borrow();
                (b.path.clone(), true)
            };
            let _ = has_rules;
            let relative = if ancestor_path.is_empty() {
                node_path.clone()
            } else {
                node_path[ancestor_path.len() + 1..].to_string()
            };
            if a.borrow().ignore_rules.should_ignore(Path::new(&relative), is_dir) {
                any_git_ignored = true;
            }
            ancestor = a.borrow().parent();
        }

        let path_ref = Path::new(&node_path);
        let any_extra_excluded = self.extra_excludes.should_ignore(path_ref, is_dir);
        let any_extra_included = self.extra_includes.should_ignore(path_ref, is_dir);

        let result = (any_git_ignored || any_extra_excluded) && !any_extra_included;
        node.borrow_mut().should_ignore_cache = Some(result);
        result
    }
}
