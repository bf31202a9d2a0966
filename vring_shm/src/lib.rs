//! # vring shared memory slot ring
//!
//! A single-writer, multi-reader ring of fixed-size slots living in shared
//! memory, used to stream data units (video frames, network packets) from one
//! producer process to several independent consumer processes without going
//! through a kernel channel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────────┐    ┌─────────────────┐
//! │   Writer        │    │  /dev/shm/vring_<name>   │    │   Reader 1      │
//! │                 │    │                          │    │                 │
//! │ RingWriter      ├───►│ SegmentHeader            ├───►│ RingReader      │
//! │                 │    │ ShmRingBuffer            │    │ (own cursor)    │
//! └─────────────────┘    │  cursors, fill level     │    └─────────────────┘
//!                        │  locks, condvars         │
//!                        │  reader table            │    ┌─────────────────┐
//!                        │ slot arena               ├───►│   Reader N      │
//!                        └──────────────────────────┘    └─────────────────┘
//! ```
//!
//! Every reader keeps its own cursor. The fill level the writer sees is
//! measured from the slowest reader, so a slot is only reused once every
//! registered reader has consumed it. Readers that die or hang are purged
//! after a liveness timeout, so they cannot stall the writer forever.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vring_shm::{RingReader, RingWriter};
//! use vring_shm::vring::config::RingConfig;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Producer
//! let mut writer = RingWriter::create("camera0", &RingConfig::new(1500, 64))?;
//!
//! // Consumer (normally another process)
//! let mut reader = RingReader::attach("camera0")?;
//!
//! writer.write_frames(&[b"frame-0".as_slice(), b"frame-1".as_slice()])?;
//! reader.wait(2, Duration::from_millis(100))?;
//! for frame in reader.read_frames(2)? {
//!     println!("{} bytes", frame.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The lower-level transaction API (`begin_access` / `end_access`) on
//! [`ShmRingBuffer`] hands out slot ranges instead of copying.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, RingError>`. `NotAllowed` and
//! `TimedOut` are transient; see [`RingError::is_transient`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod discovery;
pub mod error;
pub mod monitoring;
pub mod platform;
pub mod reader;
pub mod readers;
pub mod ring;
pub mod segment;
pub mod sync;
pub mod writer;

pub use vring;

pub use discovery::{SegmentDiscovery, SegmentInfo};
pub use error::{RingError, RingResult};
pub use monitoring::{Alert, AlertSeverity, AlertType, ReaderStatus, RingStatus};
pub use reader::RingReader;
pub use ring::{Access, DataRegion, Grant, ShmRingBuffer};
pub use segment::{RingSegment, SegmentHeader, SegmentLayout};
pub use writer::{RingWriter, remove_segment};

use vring::config::LogLevel;

/// Initialize tracing for the ring and its callers.
///
/// `RUST_LOG` wins when set; otherwise `fallback` decides the verbosity.
pub fn init_tracing(fallback: LogLevel) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.as_filter()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
