use std::fs::write;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::NamedTempFile;

/// Creates a minimal config file for the CLI to read.
fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"repository: markpigeon-shelf\nprivacy_acknowledged: true\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_both_subcommands() {
    let mut cmd = Command::cargo_bin("markpigeon").expect("Binary exists");

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish").and(predicate::str::contains("check")));
}

#[test]
fn publish_with_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("markpigeon").expect("Binary exists");

    cmd.arg("publish")
        .arg("--config")
        .arg("does-not-exist.yaml")
        .arg("--html")
        .arg("does-not-exist.html")
        .env("GITHUB_TOKEN", "dummy-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.yaml"));
}

#[test]
#[serial]
fn check_without_token_fails_before_any_network_call() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("markpigeon").expect("Binary exists");

    cmd.arg("check")
        .arg("--config")
        .arg(config.path())
        .env_remove("GITHUB_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
#[serial]
fn publish_refuses_without_privacy_acknowledgment() {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(config.path(), b"repository: markpigeon-shelf\n").expect("Writing temp config failed");
    let html = tempfile::Builder::new()
        .suffix(".html")
        .tempfile()
        .expect("Creating temp html failed");
    write(html.path(), b"<html></html>").expect("Writing temp html failed");

    let mut cmd = Command::cargo_bin("markpigeon").expect("Binary exists");

    cmd.arg("publish")
        .arg("--config")
        .arg(config.path())
        .arg("--html")
        .arg(html.path())
        .env("GITHUB_TOKEN", "dummy-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("privacy"));
}

#[test]
#[serial]
fn publish_with_missing_document_fails_with_the_offending_path() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("markpigeon").expect("Binary exists");

    cmd.arg("publish")
        .arg("--config")
        .arg(config.path())
        .arg("--html")
        .arg("no-such-document.html")
        .env("GITHUB_TOKEN", "dummy-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-document.html"));
}
