//! Error types for ring buffer operations

use thiserror::Error;
use vring::config::ConfigError;

/// Errors returned by the ring core and the segment layer.
///
/// The first six variants form the closed result set of the ring protocol
/// itself; the remaining ones only come from mapping segments and from the
/// operating system.
#[derive(Error, Debug)]
pub enum RingError {
    /// Malformed caller argument, unknown reader or a bound overflow
    #[error("Invalid parameter: {what}")]
    InvalidParameter {
        /// What was rejected
        what: &'static str,
    },

    /// Operation attempted before a successful `init`
    #[error("Ring buffer not initialized")]
    NotInitialized,

    /// A write transaction is already open (transient, retry later)
    #[error("Operation not allowed: {what}")]
    NotAllowed {
        /// Why the operation was refused
        what: &'static str,
    },

    /// The reader table is exhausted
    #[error("Too many readers (capacity {capacity})")]
    TooManyReaders {
        /// Reader table capacity
        capacity: usize,
    },

    /// Wait predicate not satisfied within the requested window
    #[error("Timed out waiting for ring buffer level")]
    TimedOut,

    /// The process-shared condition variable wait itself failed
    #[error("Condition variable wait failed: {source}")]
    CondWaitFailed {
        /// Errno reported by the wait primitive
        source: nix::Error,
    },

    /// Segment already exists
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Segment exists but its header does not describe a usable ring
    #[error("Invalid segment {name}: {reason}")]
    InvalidSegment {
        /// Segment name
        name: String,
        /// What failed validation
        reason: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// Ring configuration rejected
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: ConfigError,
    },
}

impl RingError {
    /// Shorthand for [`RingError::InvalidParameter`].
    pub(crate) const fn invalid(what: &'static str) -> Self {
        Self::InvalidParameter { what }
    }

    /// True for failures a caller is expected to retry (`NotAllowed`, `TimedOut`).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotAllowed { .. } | Self::TimedOut)
    }
}

/// Result type for ring buffer operations
pub type RingResult<T> = Result<T, RingError>;
