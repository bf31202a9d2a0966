//! Ring configuration file tests.
//!
//! Tests for `RingConfigFile` loading: defaults, unknown log levels,
//! missing required fields and semantic validation after a successful parse.

use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use vring_common::config::{ConfigError, ConfigLoader, LogLevel, RingConfig, RingConfigFile};

/// Write `content` as `vring.toml` into `dir` and return its path.
fn write_ring_toml(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("vring.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn full_config_round_trips_through_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_ring_toml(
        dir.path(),
        r#"
[ring]
slot_size = 1500
slot_count = 128
reader_timeout_ms = 250
log_level = "trace"
"#,
    );

    let file = RingConfigFile::load(&path).unwrap();
    assert_eq!(
        file.ring,
        RingConfig {
            slot_size: 1500,
            slot_count: 128,
            reader_timeout_ms: 250,
            log_level: LogLevel::Trace,
        }
    );
    assert_eq!(file.ring.reader_timeout(), Duration::from_millis(250));

    let rendered = toml::to_string(&file).unwrap();
    assert!(rendered.contains("slot_count = 128"));
}

#[test]
fn optional_fields_take_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_ring_toml(
        dir.path(),
        r#"
[ring]
slot_size = 64
slot_count = 4
"#,
    );

    let ring = RingConfigFile::load(&path).unwrap().ring;
    assert_eq!(ring.reader_timeout_ms, 2000);
    assert_eq!(ring.log_level, LogLevel::Info);
    assert!(ring.validate().is_ok());
}

#[test]
fn missing_slot_count_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_ring_toml(
        dir.path(),
        r#"
[ring]
slot_size = 64
"#,
    );

    let result = RingConfigFile::load(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn unknown_log_level_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_ring_toml(
        dir.path(),
        r#"
[ring]
slot_size = 64
slot_count = 8
log_level = "verbose"
"#,
    );

    assert!(matches!(
        RingConfigFile::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn parsed_but_invalid_geometry_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_ring_toml(
        dir.path(),
        r#"
[ring]
slot_size = 0
slot_count = 8
"#,
    );

    let ring = RingConfigFile::load(&path).unwrap().ring;
    let err = ring.validate().unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("slot_size"));
}
