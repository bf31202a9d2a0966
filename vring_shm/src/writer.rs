//! Producer handle owning a ring segment

use crate::error::{RingError, RingResult};
use crate::monitoring::RingStatus;
use crate::platform::current_pid;
use crate::ring::{Access, ShmRingBuffer};
use crate::segment::{RingSegment, segment_path};
use nix::unistd::Pid;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use vring::config::RingConfig;

/// Single writer with exclusive segment ownership.
///
/// Creates the segment on construction and removes the backing file on
/// drop. Readers that are still attached keep their mapping.
#[derive(Debug)]
pub struct RingWriter {
    segment: RingSegment,
    pid: Pid,
    slots_written: u64,
}

impl RingWriter {
    /// Create ring `name` under `/dev/shm`.
    pub fn create(name: &str, config: &RingConfig) -> RingResult<Self> {
        Ok(Self::from_segment(RingSegment::create(name, config)?))
    }

    /// Create a ring backed by the file at `path`.
    pub fn create_at(name: &str, path: &Path, config: &RingConfig) -> RingResult<Self> {
        Ok(Self::from_segment(RingSegment::create_at(name, path, config)?))
    }

    fn from_segment(segment: RingSegment) -> Self {
        Self {
            segment,
            pid: current_pid(),
            slots_written: 0,
        }
    }

    /// Open a write transaction for up to `max_slots` slots, let `fill`
    /// populate the granted bytes and commit every granted slot.
    ///
    /// Returns the number of committed slots, which may be 0 when the ring
    /// is full. `fill` is not called for an empty grant.
    pub fn write_with<F>(&mut self, max_slots: u32, fill: F) -> RingResult<u32>
    where
        F: FnOnce(&mut [u8]),
    {
        let grant = self.ring().begin_access(Access::Write, self.pid, max_slots)?;
        if !grant.is_empty() {
            match self.segment.slot_bytes_mut(grant.offset, grant.num_slots) {
                Ok(bytes) => fill(bytes),
                Err(e) => {
                    // Close the transaction without publishing anything.
                    self.ring()
                        .end_access(Access::Write, self.pid, grant.offset, 0)?;
                    return Err(e);
                }
            }
        }
        self.ring()
            .end_access(Access::Write, self.pid, grant.offset, grant.num_slots)?;
        self.slots_written += u64::from(grant.num_slots);
        Ok(grant.num_slots)
    }

    /// Copy `frames` into consecutive slots, one frame per slot, shorter
    /// frames zero-padded. Returns how many frames fit.
    pub fn write_frames(&mut self, frames: &[&[u8]]) -> RingResult<usize> {
        let slot_size = self.ring().slot_size() as usize;
        if frames.iter().any(|frame| frame.len() > slot_size) {
            return Err(RingError::invalid("frame larger than slot_size"));
        }

        let mut written = 0;
        while written < frames.len() {
            let wanted = u32::try_from(frames.len() - written).unwrap_or(u32::MAX);
            let pending = &frames[written..];
            let granted = self.write_with(wanted, |bytes| {
                for (slot, frame) in bytes.chunks_exact_mut(slot_size).zip(pending) {
                    slot[..frame.len()].copy_from_slice(frame);
                    slot[frame.len()..].fill(0);
                }
            })?;
            if granted == 0 {
                break;
            }
            written += granted as usize;
        }
        debug!("Wrote {} of {} frames to {}", written, frames.len(), self.name());
        Ok(written)
    }

    /// Block until `num_slots` slots are free or `timeout` passes.
    pub fn wait_space(&self, num_slots: u32, timeout: Duration) -> RingResult<()> {
        self.ring().wait_write(num_slots, timeout)
    }

    /// Free slots as seen by the writer.
    pub fn available(&self) -> RingResult<u32> {
        self.ring().update_available(Access::Write, self.pid)
    }

    /// Snapshot of the ring.
    pub fn status(&self) -> RingResult<RingStatus> {
        self.ring().status()
    }

    /// Shared ring core.
    pub fn ring(&self) -> &ShmRingBuffer {
        self.segment.ring()
    }

    /// Ring name.
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Slots committed through this handle.
    pub fn slots_written(&self) -> u64 {
        self.slots_written
    }
}

impl Drop for RingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.segment.unlink() {
            warn!("Failed to remove segment {}: {}", self.segment.name(), e);
        }
    }
}

/// Remove the segment file of ring `name`, e.g. one left behind by a crashed writer.
pub fn remove_segment(name: &str) -> RingResult<()> {
    match std::fs::remove_file(segment_path(name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RingError::NotFound {
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}
