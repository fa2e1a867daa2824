//! CLI integration tests
//!
//! These exercise the compiled binary's argument handling and exit codes.
//! Network-dependent paths are covered elsewhere; here we stick to surfaces
//! that fail fast (help, bad flags, missing credentials, missing files).

use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Path to the airlift binary built alongside the tests
fn airlift_bin() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("airlift")
}

#[test]
fn test_cli_help() {
    let output = Command::new(airlift_bin())
        .arg("--help")
        .output()
        .expect("Failed to run airlift --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["trigger", "poll", "download", "deliver", "run"] {
        assert!(stdout.contains(subcommand), "help missing subcommand {}", subcommand);
    }
}

#[test]
fn test_invalid_provider_is_rejected() {
    let output = Command::new(airlift_bin())
        .args(["trigger", "--ci", "travis", "--repo", "u/r"])
        .output()
        .expect("Failed to run airlift");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid provider"));
}

#[test]
fn test_missing_provider_exits_nonzero() {
    let output = Command::new(airlift_bin())
        .args(["poll", "--run-id", "1", "--repo", "u/r"])
        .env_remove("AIRLIFT_PROVIDER")
        .output()
        .expect("Failed to run airlift");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("AIRLIFT_PROVIDER") || stderr.contains("--ci"));
}

#[test]
fn test_missing_credential_exits_nonzero() {
    let output = Command::new(airlift_bin())
        .args(["poll", "--ci", "github", "--repo", "u/r", "--run-id", "1"])
        .env_remove("GITHUB_TOKEN")
        .output()
        .expect("Failed to run airlift");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GITHUB_TOKEN"));
}

#[test]
fn test_deliver_missing_file_exits_nonzero() {
    let output = Command::new(airlift_bin())
        .args(["deliver", "--file", "/nonexistent/payload.apk", "--no-notify"])
        .output()
        .expect("Failed to run airlift");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/nonexistent/payload.apk"));
}

#[test]
fn test_poll_requires_a_build_identifier() {
    let output = Command::new(airlift_bin())
        .args(["poll", "--ci", "github"])
        .env("GITHUB_TOKEN", "test-token")
        .output()
        .expect("Failed to run airlift");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no build identified"));
}

#[test]
fn test_version_flag() {
    let output = Command::new(airlift_bin())
        .arg("--version")
        .output()
        .expect("Failed to run airlift --version");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("airlift"));
}
