//! CLI integration tests

use std::process::{Command, Output};

fn ktop(args: &[&str]) -> Output {
    let home = tempfile::tempdir().expect("Failed to create temp home");
    Command::new(env!("CARGO_BIN_EXE_ktop"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("KUBECONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = ktop(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("top-K"), "Should describe the tool");
    assert!(stdout.contains("--pods"), "Should show pods flag");
    assert!(stdout.contains("--count"), "Should show count option");
    assert!(stdout.contains("countpods"), "Should show count alias");
    assert!(stdout.contains("--sort"), "Should show sort option");
    assert!(stdout.contains("--once"), "Should show once flag");
    assert!(stdout.contains("KUBECONFIG"), "Should show kubeconfig env var");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = ktop(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ktop"), "Should show binary name");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = ktop(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test invalid sort key error handling
#[test]
fn test_invalid_sort_key() {
    let output = ktop(&["--sort", "disk", "--once"]);

    assert!(!output.status.success(), "Invalid sort key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("disk"), "Should name the rejected value");
}

/// Test that configuration is validated before contacting a cluster
#[test]
fn test_zero_count_is_rejected() {
    let output = ktop(&["--count", "0", "--once"]);

    assert!(!output.status.success(), "Zero count should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("top-k must be greater than zero"),
        "Should explain the invalid count: {stderr}"
    );
}

/// Test that an explicit config file must exist
#[test]
fn test_missing_config_file() {
    let output = ktop(&["--config", "/nonexistent/ktop.json", "--once"]);

    assert!(!output.status.success(), "Missing config file should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration"), "Should mention configuration");
}

/// Test invalid flag error handling
#[test]
fn test_invalid_flag() {
    let output = ktop(&["--invalid-flag"]);

    assert!(!output.status.success(), "Invalid flag should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("unexpected"),
        "Should show error message"
    );
}

/// Test that an oversized bar width is rejected before contacting a cluster
#[test]
fn test_oversized_bar_width_is_rejected() {
    let output = ktop(&["--bar-width", "4000000000", "--once"]);

    assert!(!output.status.success(), "Oversized bar width should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("exceeds the maximum of 200"),
        "Should explain the bar width limit: {stderr}"
    );
}
