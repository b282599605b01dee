//! Black-box tests invoking the built `duplexd` binary directly, covering
//! argument parsing errors and `--version`/`--help` as seen from outside the
//! process (the unit-level parser cases live beside `cli.rs`).

use std::process::Command;

fn duplexd_bin() -> &'static str {
    env!("CARGO_BIN_EXE_duplexd")
}

#[test]
fn test_no_command_prints_usage_and_exits_nonzero() {
    let output = Command::new(duplexd_bin()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}

#[test]
fn test_unknown_command_errors() {
    let output = Command::new(duplexd_bin()).arg("bogus").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown command"));
}

#[test]
fn test_version_flag_prints_version_and_exits_zero() {
    let output = Command::new(duplexd_bin()).arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.trim().is_empty());
}

#[test]
fn test_help_flag_prints_usage_and_exits_zero() {
    let output = Command::new(duplexd_bin()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}

#[test]
fn test_sync_without_root_errors() {
    let output = Command::new(duplexd_bin()).args(["sync"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--root"));
}

#[test]
fn test_sync_without_mirror_errors_with_loopback_message() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = Command::new(duplexd_bin())
        .args(["sync", "--root", dir.path().to_str().unwrap(), "--once"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--mirror"));
}
