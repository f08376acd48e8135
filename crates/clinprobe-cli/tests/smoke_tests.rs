//! Smoke tests for the clinprobe CLI
//!
//! Only paths that stop before a browser is launched are exercised here.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use fs2::FileExt;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the clinprobe binary
fn clinprobe() -> Command {
    Command::cargo_bin("clinprobe").expect("clinprobe binary should exist")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    clinprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    clinprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--headless"))
        .stdout(predicate::str::contains("--env-file"))
        .stdout(predicate::str::contains("--lock-file"))
        .stdout(predicate::str::contains("--ascii"));
}

#[test]
fn test_unknown_flag_fails() {
    clinprobe().arg("--bogus").assert().failure();
}

// ============================================================================
// Startup Failures
// ============================================================================

#[test]
fn test_missing_env_file_exits_with_startup_code() {
    let dir = TempDir::new().unwrap();
    clinprobe()
        .current_dir(dir.path())
        .args(["--env-file", "does-not-exist.env", "--ascii"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does-not-exist.env"));
}

#[test]
fn test_held_lock_exits_with_startup_code() {
    let dir = TempDir::new().unwrap();
    let lock = dir.path().join("clinprobe.lock");
    let holder = fs::File::create(&lock).unwrap();
    holder.try_lock_exclusive().unwrap();

    clinprobe()
        .current_dir(dir.path())
        .env_remove("CLINPROBE_LOG")
        .args(["--ascii", "--lock-file"])
        .arg(&lock)
        .arg("--log-file")
        .arg(dir.path().join("run.log"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));

    assert!(lock.exists());
    let log = fs::read_to_string(dir.path().join("run.log")).unwrap();
    assert!(log.contains("[ERRO]"));
}
