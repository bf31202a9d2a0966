//! System-wide constants for the vring workspace.
//!
//! Single source of truth for ring limits, liveness thresholds and the
//! shared memory naming scheme. Imported by all crates; no duplication
//! permitted.

/// Maximum number of concurrently registered reader processes per ring.
///
/// The reader table is a fixed array living inside the shared segment, so
/// this value is part of the segment layout.
pub const MAX_READERS: usize = 8;

/// Nanoseconds per second.
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Default reader liveness threshold in nanoseconds (2 s).
///
/// A reader that has not begun/ended a read or iterated a wait loop for
/// longer than this is purged after the next completed write.
pub const READER_TIMEOUT_NS: u64 = 2 * NSEC_PER_SEC;

/// CPU cache line size in bytes.
///
/// Used to align the ring core and the slot arena inside a segment so the
/// writer and reader hot fields do not share a line with the header.
pub const CACHE_LINE_SIZE: usize = 64;

/// Magic number at the start of every ring segment: `"VRINGSHM"`.
pub const VRING_SHM_MAGIC: u64 = u64::from_le_bytes(*b"VRINGSHM");

/// Directory + file prefix of ring segments (`/dev/shm/vring_<name>`).
pub const SHM_PATH_PREFIX: &str = "/dev/shm/vring_";

/// Upper bound on the slot arena of a single segment (1 GiB).
pub const MAX_ARENA_SIZE: u64 = 1_073_741_824;

static_assertions::const_assert!(MAX_READERS > 0);
static_assertions::const_assert!(CACHE_LINE_SIZE.is_power_of_two());
static_assertions::const_assert!(MAX_ARENA_SIZE <= u32::MAX as u64);
