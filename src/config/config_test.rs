use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use crate::StoreConfig;

#[test]
#[serial]
fn test_defaults_without_sources() {
    let config = StoreConfig::load(None).expect("defaults should load");
    assert_eq!(config.root, "/");
    assert_eq!(config.watch.buffer_size, 10);
    assert_eq!(config.watch.free_retries, 10);
}

#[test]
#[serial]
fn test_load_from_file() {
    let mut file = NamedTempFile::with_suffix(".toml").expect("temp file");
    writeln!(
        file,
        r#"
root = "/clusters/test"

[watch]
poll_interval_ms = 25
max_delay_ms = 2000
"#
    )
    .expect("write config");

    let config =
        StoreConfig::load(Some(file.path().to_str().unwrap())).expect("file config should load");
    assert_eq!(config.root, "/clusters/test");
    assert_eq!(config.watch.poll_interval_ms, 25);
    assert_eq!(config.watch.max_delay_ms, 2000);
    // Untouched fields keep their defaults.
    assert_eq!(config.watch.buffer_size, 10);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let mut file = NamedTempFile::with_suffix(".toml").expect("temp file");
    writeln!(file, r#"root = "/from-file""#).expect("write config");

    std::env::set_var("METAKV_ROOT", "/from-env");
    let config =
        StoreConfig::load(Some(file.path().to_str().unwrap())).expect("config should load");
    std::env::remove_var("METAKV_ROOT");

    assert_eq!(config.root, "/from-env");
}

#[test]
#[serial]
fn test_missing_file_is_an_error() {
    assert!(StoreConfig::load(Some("/nonexistent/metakv.toml")).is_err());
}

#[test]
#[serial]
fn test_with_root() {
    let config = StoreConfig::default().with_root("/clusters/cell-1");
    assert_eq!(config.root, "/clusters/cell-1");
}
