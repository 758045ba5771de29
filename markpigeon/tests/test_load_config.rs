use std::fs::write;

use markpigeon::load_config::load_config;
use markpigeon_core::config::DEFAULT_REPOSITORY;
use markpigeon_core::contract::Visibility;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp config file failed");
    write(file.path(), contents).expect("Writing temp config failed");
    file
}

#[test]
fn load_config_reads_all_fields() {
    let config = write_config(
        "repository: my-shelf\n\
         owner: alice\n\
         visibility: private\n\
         privacy_acknowledged: true\n\
         star_markpigeon: false\n\
         executor:\n\
           concurrency: 2\n",
    );

    let loaded = load_config(config.path()).expect("config should load");

    assert_eq!(loaded.publish.repository, "my-shelf");
    assert_eq!(loaded.publish.owner.as_deref(), Some("alice"));
    assert_eq!(loaded.publish.visibility, Visibility::Private);
    assert!(loaded.publish.privacy_acknowledged);
    assert!(!loaded.star_markpigeon);
    assert_eq!(loaded.publish.executor.concurrency, 2);
}

#[test]
fn load_config_applies_defaults() {
    let config = write_config("privacy_acknowledged: true\n");

    let loaded = load_config(config.path()).expect("minimal config should load");

    assert_eq!(loaded.publish.repository, DEFAULT_REPOSITORY);
    assert_eq!(loaded.publish.owner, None);
    assert_eq!(loaded.publish.visibility, Visibility::Public);
    assert!(loaded.star_markpigeon);
    assert_eq!(loaded.publish.executor.concurrency, 4);
}

#[test]
fn privacy_acknowledgment_defaults_to_false() {
    // An empty mapping is a valid config, but it must not be publishable
    // until the user has acknowledged the privacy warning.
    let config = write_config("repository: my-shelf\n");

    let loaded = load_config(config.path()).expect("config should load");

    assert!(!loaded.publish.privacy_acknowledged);
}

#[test]
fn missing_config_file_is_a_clear_error() {
    let err = load_config("definitely-not-here.yaml").expect_err("load should fail");

    assert!(
        err.to_string().contains("definitely-not-here.yaml"),
        "error should name the missing file, got: {err}"
    );
}

#[test]
fn malformed_yaml_is_rejected() {
    let config = write_config("repository: [unclosed\n");

    let err = load_config(config.path()).expect_err("load should fail");

    assert!(
        err.to_string().contains("parse"),
        "error should mention parsing, got: {err}"
    );
}
