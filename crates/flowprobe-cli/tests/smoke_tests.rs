//! Smoke tests for the flowprobe CLI
//!
//! None of these launch a browser.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the flowprobe binary with a clean `FLOWPROBE_*` environment
fn flowprobe() -> Command {
    let mut cmd = Command::cargo_bin("flowprobe").expect("flowprobe binary should exist");
    for (key, _) in std::env::vars() {
        if key.starts_with("FLOWPROBE_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    flowprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    flowprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    flowprobe().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    flowprobe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signup"))
        .stdout(predicate::str::contains("--hold"));
}

#[test]
fn test_unknown_flow_rejected() {
    flowprobe()
        .args(["run", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("checkout"));
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_prints_defaults() {
    flowprobe()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://localhost:3000"))
        .stdout(predicate::str::contains("dialog_timeout_ms"));
}

#[test]
fn test_config_applies_flags() {
    flowprobe()
        .args(["config", "--base-url", "http://staging.test", "--hold", "forever"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://staging.test"))
        .stdout(predicate::str::contains("indefinite"));
}

#[test]
fn test_config_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flowprobe.yaml");
    fs::write(&path, "base_url: https://app.example.test\ndefault_timeout_ms: 2500\n").unwrap();

    flowprobe()
        .args(["config", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://app.example.test"))
        .stdout(predicate::str::contains("2500"));
}

#[test]
fn test_config_env_override() {
    flowprobe()
        .arg("config")
        .env("FLOWPROBE_TIMEOUT_MS", "1234")
        .assert()
        .success()
        .stdout(predicate::str::contains("default_timeout_ms: 1234"));
}

#[test]
fn test_config_rejects_bad_url() {
    flowprobe()
        .args(["config", "--base-url", "ftp://files.test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_config_rejects_bad_hold() {
    flowprobe()
        .args(["config", "--hold", "later"])
        .assert()
        .failure();
}

#[test]
fn test_profile_without_username_fails_before_launch() {
    flowprobe()
        .args(["run", "profile"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("username"));
}
