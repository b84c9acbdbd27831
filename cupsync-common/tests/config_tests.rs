//! Configuration resolution tests
//!
//! Environment-variable tests are serialized; the process environment is
//! shared between test threads.

use std::io::Write;

use cupsync_common::config::{IngestConfig, CONFIG_ENV_VAR, COOKIE_ENV_VAR};
use serial_test::serial;

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn explicit_config_file_is_loaded() {
    std::env::remove_var(CONFIG_ENV_VAR);
    std::env::remove_var(COOKIE_ENV_VAR);

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
            club_id = "777"
            cookie = "session=abc"
            data_file = "archive/cups.json"
        "#,
    );

    let config = IngestConfig::load(Some(&path)).unwrap();
    assert_eq!(config.club_id, "777");
    assert_eq!(config.cookie.as_deref(), Some("session=abc"));
    assert_eq!(
        config.data_file,
        std::path::PathBuf::from("archive/cups.json")
    );
}

#[test]
#[serial]
fn explicit_config_file_must_exist() {
    std::env::remove_var(CONFIG_ENV_VAR);
    let missing = std::path::Path::new("/nonexistent/cupsync/config.toml");
    assert!(IngestConfig::load(Some(missing)).is_err());
}

#[test]
#[serial]
fn env_names_the_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"club_id = "555""#);

    std::env::set_var(CONFIG_ENV_VAR, &path);
    std::env::remove_var(COOKIE_ENV_VAR);
    let config = IngestConfig::load(None).unwrap();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.club_id, "555");
}

#[test]
#[serial]
fn cookie_env_wins_over_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"cookie = "session=from-file""#);

    std::env::set_var(COOKIE_ENV_VAR, "session=from-env");
    let config = IngestConfig::load(Some(&path)).unwrap();
    std::env::remove_var(COOKIE_ENV_VAR);

    assert_eq!(config.cookie.as_deref(), Some("session=from-env"));
}

#[test]
#[serial]
fn malformed_toml_is_a_config_error() {
    std::env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "club_id = [not toml");
    let err = IngestConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
