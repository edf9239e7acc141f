//! End-to-end tests for the command-line surface
//!
//! These run the built binary. None of them reach a chat server: they
//! cover argument parsing and configuration validation, which fail before
//! any network call.

use assert_cmd::Command;
use predicates::prelude::*;
mod common;

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("messages"))
        .stdout(predicate::str::contains("rename"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("chatwire"));
}

#[test]
fn test_missing_subcommand_fails() {
    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_rename_requires_title() {
    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.arg("rename").arg("3");
    cmd.assert().failure();
}

#[test]
fn test_invalid_server_url_is_rejected() {
    let (_temp_dir, config_path) = common::temp_config_file("server:\n  base_url: localhost\n");

    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.env_remove("CHATWIRE_BASE_URL")
        .arg("--config")
        .arg(config_path)
        .arg("new");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("base_url"));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let (_temp_dir, config_path) =
        common::temp_config_file("server:\n  base_url: http://127.0.0.1:9\n  request_timeout_seconds: 0\n");

    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.env_remove("CHATWIRE_REQUEST_TIMEOUT")
        .arg("--config")
        .arg(config_path)
        .arg("messages")
        .arg("1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("request_timeout_seconds"));
}

#[test]
fn test_server_flag_overrides_config() {
    let (_temp_dir, config_path) = common::temp_config_file("server:\n  base_url: localhost\n");

    // The file value is invalid; a valid --server wins and validation passes,
    // so the command only fails later with an unknown chat type.
    let mut cmd = Command::cargo_bin("chatwire").unwrap();
    cmd.env_remove("CHATWIRE_BASE_URL")
        .arg("--config")
        .arg(config_path)
        .arg("--server")
        .arg("http://127.0.0.1:9")
        .arg("new")
        .arg("--type")
        .arg("poetry");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("poetry"))
        .stderr(predicate::str::contains("base_url").not());
}
