//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for ring producers and consumers.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vring_common::config::{ConfigLoader, ConfigError, RingConfigFile};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let file = RingConfigFile::load(Path::new("vring.toml"))?;
//!     file.ring.validate()?;
//!     println!("{} slots of {} bytes", file.ring.slot_count, file.ring.slot_size);
//!     Ok(())
//! }
//! ```

use crate::consts::{NSEC_PER_SEC, READER_TIMEOUT_NS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_reader_timeout_ms() -> u64 {
    READER_TIMEOUT_NS / (NSEC_PER_SEC / 1000)
}

/// Geometry and liveness settings of one ring.
///
/// # TOML Example
///
/// ```toml
/// [ring]
/// slot_size = 1500
/// slot_count = 64
/// reader_timeout_ms = 2000
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Size of one slot in bytes (one data unit, e.g. one video packet).
    pub slot_size: u32,

    /// Number of slots in the ring.
    pub slot_count: u32,

    /// Reader liveness threshold in milliseconds.
    #[serde(default = "default_reader_timeout_ms")]
    pub reader_timeout_ms: u64,

    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl RingConfig {
    /// Create a configuration with the default liveness threshold.
    pub fn new(slot_size: u32, slot_count: u32) -> Self {
        Self {
            slot_size,
            slot_count,
            reader_timeout_ms: default_reader_timeout_ms(),
            log_level: LogLevel::default(),
        }
    }

    /// Reader liveness threshold as a `Duration`.
    pub fn reader_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_timeout_ms)
    }

    /// Size of the slot arena in bytes.
    pub fn arena_size(&self) -> u64 {
        u64::from(self.slot_size) * u64::from(self.slot_count)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `slot_size` is zero
    /// - `slot_count` is below two (one slot is always kept free)
    /// - `reader_timeout_ms` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_size == 0 {
            return Err(ConfigError::ValidationError(
                "slot_size cannot be zero".to_string(),
            ));
        }
        if self.slot_count < 2 {
            return Err(ConfigError::ValidationError(format!(
                "slot_count must be at least 2, got {}",
                self.slot_count
            )));
        }
        if self.reader_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reader_timeout_ms cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level layout of a ring configuration file (`[ring]` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfigFile {
    /// The ring settings.
    pub ring: RingConfig,
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::default().as_filter(), "info");
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"")
                .unwrap()
                .level,
            LogLevel::Warn
        );
    }

    #[test]
    fn test_ring_config_defaults() {
        let config = RingConfig::new(1500, 64);
        assert_eq!(config.reader_timeout(), Duration::from_secs(2));
        assert_eq!(config.arena_size(), 1500 * 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ring_config_validation() {
        assert!(matches!(
            RingConfig::new(0, 64).validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            RingConfig::new(1500, 1).validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = RingConfig::new(1500, 64);
        config.reader_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = RingConfigFile::load(Path::new("/nonexistent/path/vring.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_success() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[ring]
slot_size = 1316
slot_count = 32
log_level = "debug"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = RingConfigFile::load(file.path()).unwrap().ring;
        assert_eq!(config.slot_size, 1316);
        assert_eq!(config.slot_count, 32);
        assert_eq!(config.reader_timeout_ms, 2000);
        assert_eq!(config.log_level, LogLevel::Debug);
    }
}
