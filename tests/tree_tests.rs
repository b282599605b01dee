//! Integration-level invariant and boundary-scenario tests for `UpdateTree`,
//! covering the full local+remote convergence path rather than the
//! single-side unit tests that live beside the module.

use std::path::Path;

use duplexd::path_rules::PathRules;
use duplexd::tree::UpdateTree;
use duplexd::update::Update;

fn tree() -> UpdateTree {
    UpdateTree::new(PathRules::empty(), PathRules::empty())
}

#[test]
fn test_convergence_after_asymmetric_initial_scans() {
    let tree = tree();
    tree.add_local(Update::new("a.txt", 100, false)).unwrap();
    tree.add_remote(Update::new("b.txt", 50, false)).unwrap();

    let a = tree.find("a.txt").unwrap();
    let b = tree.find("b.txt").unwrap();
    assert!(a.borrow().is_local_newer());
    assert!(b.borrow().is_remote_newer());

    tree.snapshot_remote_from_local(&a);
    tree.snapshot_local_from_remote(&b);

    assert_eq!(
        a.borrow().local().unwrap().mod_time,
        a.borrow().remote().unwrap().mod_time
    );
    assert_eq!(
        b.borrow().local().unwrap().mod_time,
        b.borrow().remote().unwrap().mod_time
    );
}

#[test]
fn test_type_flip_drops_children_and_flags_conflict() {
    let tree = tree();
    tree.add_local(Update::new("x", 1, true)).unwrap();
    tree.add_local(Update::new("x/y.txt", 1, false)).unwrap();
    tree.add_remote(Update::new("x", 500, false).with_symlink("target")).unwrap();

    let x = tree.find("x").unwrap();
    assert!(!x.borrow().is_same_type());
    assert!(x.borrow().is_remote_newer());

    tree.snapshot_local_from_remote(&x);
    assert_eq!(x.borrow().children().count(), 0);
}

#[test]
fn test_gitignore_applies_to_siblings_not_itself() {
    let tree = tree();
    tree.add_local(Update::new("d", 1, true)).unwrap();
    tree.add_local(Update::new("d/.gitignore", 10, false).with_ignore_string("secret.txt\n"))
        .unwrap();
    tree.add_local(Update::new("d/secret.txt", 20, false)).unwrap();

    let gitignore = tree.find("d/.gitignore").unwrap();
    let secret = tree.find("d/secret.txt").unwrap();
    assert!(!tree.should_ignore(&gitignore));
    assert!(tree.should_ignore(&secret));
}

#[test]
fn test_should_ignore_is_monotone_when_adding_exclude() {
    let anchor = Path::new("");
    let tree_without_excludes = UpdateTree::new(PathRules::empty(), PathRules::empty());
    tree_without_excludes.add_local(Update::new("build", 1, true)).unwrap();
    let node = tree_without_excludes.find("build").unwrap();
    assert!(!tree_without_excludes.should_ignore(&node));

    let tree_with_excludes = UpdateTree::new(
        PathRules::from_lines(anchor, ["build"]),
        PathRules::empty(),
    );
    tree_with_excludes.add_local(Update::new("build", 1, true)).unwrap();
    let node = tree_with_excludes.find("build").unwrap();
    assert!(tree_with_excludes.should_ignore(&node));
}

#[test]
fn test_empty_tree_has_only_root() {
    let tree = tree();
    let mut count = 0;
    tree.visit(|_| count += 1);
    assert_eq!(count, 1);
}
