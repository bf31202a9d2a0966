//! Named shared memory segments holding one ring
//!
//! ```text
//! 0                64                        data_offset          data_offset + data_len
//! ┌────────────────┬─────────────────────────┬───────────────────────────────┐
//! │ SegmentHeader  │ ShmRingBuffer           │ slot arena                    │
//! │ magic, layout, │ cursors, locks, readers │ slot_count * slot_size bytes  │
//! │ geometry       │                         │                               │
//! └────────────────┴─────────────────────────┴───────────────────────────────┘
//! ```
//!
//! The creator zeroes the file, initialises the ring in place and publishes
//! the magic number last, so an attacher never sees a half-built segment.

use crate::error::{RingError, RingResult};
use crate::platform::{MapConfig, attach_segment_mmap, create_segment_mmap, current_pid, is_process_alive};
use crate::ring::{DataRegion, ShmRingBuffer};
use memmap2::MmapMut;
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::mem::{align_of, size_of};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use vring::config::RingConfig;
use vring::consts::{CACHE_LINE_SIZE, MAX_ARENA_SIZE, SHM_PATH_PREFIX, VRING_SHM_MAGIC};

/// Longest accepted segment name.
pub const MAX_NAME_LEN: usize = 200;

/// Segment header with cache-line alignment
#[repr(C, align(64))]
#[derive(Debug)]
pub struct SegmentHeader {
    /// Magic number, published last by the creator
    pub magic: AtomicU64,
    /// Hash of the header and ring layouts of the creating build
    pub layout_hash: u32,
    /// Payload bytes per slot
    pub slot_size: u32,
    /// Number of slots
    pub slot_count: u32,
    /// Creating (writer) process ID
    pub writer_pid: AtomicI32,
    /// Creation time, nanoseconds since the Unix epoch
    pub created_ns: u64,
    /// Byte offset of the ring core
    pub ring_offset: u64,
    /// Byte offset of slot 0
    pub data_offset: u64,
    /// Arena length in bytes
    pub data_len: u64,
}

static_assertions::const_assert_eq!(size_of::<SegmentHeader>(), 64);
static_assertions::const_assert_eq!(align_of::<SegmentHeader>(), CACHE_LINE_SIZE);

/// Size/alignment fingerprint of a type, stable across processes of one build.
pub const fn struct_version_hash<T>() -> u32 {
    let size = size_of::<T>() as u32;
    let align = align_of::<T>() as u32;
    size.wrapping_mul(0x9E3779B9) ^ align.wrapping_mul(0x517CC1B7)
}

/// Fingerprint stored in every header; attachers built with a different
/// layout are rejected.
pub const LAYOUT_HASH: u32 =
    struct_version_hash::<SegmentHeader>() ^ struct_version_hash::<ShmRingBuffer>().rotate_left(16);

/// Byte layout of a segment for a given arena size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Offset of the ring core
    pub ring_offset: u64,
    /// Location of the slot arena
    pub data: DataRegion,
    /// Total file size
    pub total_size: u64,
}

impl SegmentLayout {
    /// Layout for an arena of `arena_size` bytes.
    pub const fn for_arena(arena_size: u64) -> Self {
        let ring_offset = align_up(size_of::<SegmentHeader>() as u64, align_of::<ShmRingBuffer>() as u64);
        let data_offset = align_up(
            ring_offset + size_of::<ShmRingBuffer>() as u64,
            CACHE_LINE_SIZE as u64,
        );
        Self {
            ring_offset,
            data: DataRegion::new(data_offset, arena_size),
            total_size: data_offset + arena_size,
        }
    }
}

const fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

/// Path of the segment file backing ring `name`.
pub fn segment_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", SHM_PATH_PREFIX, name))
}

fn validate_name(name: &str) -> RingResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(RingError::invalid("segment name length out of range"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(RingError::invalid("segment name contains '/' or NUL"));
    }
    Ok(())
}

fn invalid_segment(name: &str, reason: impl Into<String>) -> RingError {
    RingError::InvalidSegment {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// A mapped segment: header, ring core and slot arena.
pub struct RingSegment {
    name: String,
    path: PathBuf,
    mmap: MmapMut,
    base: *mut u8,
}

// SAFETY: the mapping is owned by the segment and stays valid until drop;
// all shared state inside it is atomics and process-shared locks.
unsafe impl Send for RingSegment {}

impl std::fmt::Debug for RingSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingSegment")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("size", &self.mmap.len())
            .finish()
    }
}

impl RingSegment {
    /// Create `/dev/shm/vring_<name>` and initialise a ring in it.
    pub fn create(name: &str, config: &RingConfig) -> RingResult<Self> {
        validate_name(name)?;
        Self::create_at(name, &segment_path(name), config)
    }

    /// Create a segment at an explicit `path`.
    pub fn create_at(name: &str, path: &Path, config: &RingConfig) -> RingResult<Self> {
        config.validate()?;
        let arena_size = config.arena_size();
        if arena_size > MAX_ARENA_SIZE {
            return Err(RingError::invalid("slot arena exceeds maximum segment size"));
        }
        let layout = SegmentLayout::for_arena(arena_size);

        let mmap = match create_segment_mmap(path, layout.total_size, &MapConfig::default()) {
            Ok(mmap) => mmap,
            Err(RingError::Io { source }) if source.kind() == ErrorKind::AlreadyExists => {
                return Err(RingError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut segment = Self::from_mmap(name, path, mmap);
        if let Err(e) = segment.initialize(config, &layout) {
            if let Err(unlink) = std::fs::remove_file(path) {
                warn!("Failed to remove half-created segment {}: {}", name, unlink);
            }
            return Err(e);
        }

        info!(
            "Created ring segment {} ({} slots x {} bytes, {} bytes total)",
            name, config.slot_count, config.slot_size, layout.total_size
        );
        Ok(segment)
    }

    fn initialize(&mut self, config: &RingConfig, layout: &SegmentLayout) -> RingResult<()> {
        let created_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        // SAFETY: the file was created exclusively by this process and is
        // large enough for the header, the ring and the arena.
        let ring = unsafe {
            (self.base as *mut SegmentHeader).write(SegmentHeader {
                magic: AtomicU64::new(0),
                layout_hash: LAYOUT_HASH,
                slot_size: config.slot_size,
                slot_count: config.slot_count,
                writer_pid: AtomicI32::new(current_pid().as_raw()),
                created_ns,
                ring_offset: layout.ring_offset,
                data_offset: layout.data.offset,
                data_len: layout.data.len,
            });
            ShmRingBuffer::init_in_place(self.base.add(layout.ring_offset as usize) as *mut ShmRingBuffer)
        };

        ring.init(config.slot_size, config.slot_count, layout.data, true)?;
        ring.set_reader_timeout(config.reader_timeout())?;
        self.header().magic.store(VRING_SHM_MAGIC, Ordering::Release);
        Ok(())
    }

    /// Map the existing segment of ring `name`.
    pub fn attach(name: &str) -> RingResult<Self> {
        validate_name(name)?;
        Self::attach_at(name, &segment_path(name))
    }

    /// Map the existing segment at `path` and validate its header.
    pub fn attach_at(name: &str, path: &Path) -> RingResult<Self> {
        let mmap = match attach_segment_mmap(path) {
            Ok(mmap) => mmap,
            Err(RingError::Io { source }) if source.kind() == ErrorKind::NotFound => {
                return Err(RingError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        if (mmap.len() as u64) < SegmentLayout::for_arena(0).total_size {
            return Err(invalid_segment(name, format!("file too small ({} bytes)", mmap.len())));
        }

        let segment = Self::from_mmap(name, path, mmap);
        segment.validate()?;

        let writer = segment.writer_pid();
        if !is_process_alive(writer) {
            warn!("Writer {} of segment {} is no longer running", writer, name);
        }
        debug!("Attached to ring segment {}", name);
        Ok(segment)
    }

    fn from_mmap(name: &str, path: &Path, mut mmap: MmapMut) -> Self {
        let base = mmap.as_mut_ptr();
        Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            mmap,
            base,
        }
    }

    fn validate(&self) -> RingResult<()> {
        let header = self.header();
        let magic = header.magic.load(Ordering::Acquire);
        if magic != VRING_SHM_MAGIC {
            return Err(invalid_segment(&self.name, format!("bad magic {:#018x}", magic)));
        }
        if header.layout_hash != LAYOUT_HASH {
            return Err(invalid_segment(
                &self.name,
                format!(
                    "layout hash {:#010x} does not match {:#010x}",
                    header.layout_hash, LAYOUT_HASH
                ),
            ));
        }

        let expected = SegmentLayout::for_arena(header.data_len);
        if header.ring_offset != expected.ring_offset || header.data_offset != expected.data.offset {
            return Err(invalid_segment(&self.name, "unexpected section offsets"));
        }
        if expected.total_size > self.mmap.len() as u64 {
            return Err(invalid_segment(&self.name, "arena extends past end of file"));
        }
        if header.data_len < u64::from(header.slot_size) * u64::from(header.slot_count) {
            return Err(invalid_segment(&self.name, "arena smaller than slot geometry"));
        }

        let ring = self.ring();
        if !ring.is_initialized() {
            return Err(invalid_segment(&self.name, "ring not initialized"));
        }
        if ring.slot_count() != header.slot_count || ring.slot_size() != header.slot_size {
            return Err(invalid_segment(&self.name, "ring geometry differs from header"));
        }
        Ok(())
    }

    /// Segment header.
    pub fn header(&self) -> &SegmentHeader {
        // SAFETY: the mapping is at least one header long and page aligned.
        unsafe { &*(self.base as *const SegmentHeader) }
    }

    /// Ring core stored in the segment.
    pub fn ring(&self) -> &ShmRingBuffer {
        // SAFETY: `ring_offset` was validated (or written) against the
        // layout of this build and lies inside the mapping.
        unsafe {
            ShmRingBuffer::from_raw(self.base.add(self.header().ring_offset as usize) as *const ShmRingBuffer)
        }
    }

    /// Arena bytes of `num_slots` slots starting at `offset`.
    pub fn slot_bytes(&self, offset: u32, num_slots: u32) -> RingResult<&[u8]> {
        let (start, len) = self.byte_span(offset, num_slots)?;
        // SAFETY: span checked against the mapping by `byte_span`.
        Ok(unsafe { std::slice::from_raw_parts(self.base.add(start), len) })
    }

    /// Mutable arena bytes of `num_slots` slots starting at `offset`.
    ///
    /// Only the holder of the matching write grant may touch these bytes.
    pub fn slot_bytes_mut(&mut self, offset: u32, num_slots: u32) -> RingResult<&mut [u8]> {
        let (start, len) = self.byte_span(offset, num_slots)?;
        // SAFETY: span checked against the mapping by `byte_span`; the
        // arena never overlaps the header or the ring core.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.base.add(start), len) })
    }

    fn byte_span(&self, offset: u32, num_slots: u32) -> RingResult<(usize, usize)> {
        let range = self.ring().slot_byte_range(offset, num_slots)?;
        if range.end > self.mmap.len() as u64 {
            return Err(RingError::invalid("slot range outside mapping"));
        }
        Ok((range.start as usize, (range.end - range.start) as usize))
    }

    /// Ring name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Process that created the segment.
    pub fn writer_pid(&self) -> Pid {
        Pid::from_raw(self.header().writer_pid.load(Ordering::Acquire))
    }

    /// Remove the backing file; existing mappings stay usable.
    pub fn unlink(&self) -> RingResult<()> {
        std::fs::remove_file(&self.path)?;
        info!("Removed ring segment {}", self.name);
        Ok(())
    }
}
