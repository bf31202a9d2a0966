//! Prelude module for common re-exports.
//!
//! ```rust
//! use vring_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, RingConfig, RingConfigFile};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_READERS, READER_TIMEOUT_NS};

/// Default reader liveness threshold as Duration.
pub const DEFAULT_READER_TIMEOUT: Duration = Duration::from_nanos(READER_TIMEOUT_NS);
