//! Consumer handle registered in a ring's reader table

use crate::error::RingResult;
use crate::platform::current_pid;
use crate::ring::{Access, ShmRingBuffer};
use crate::segment::RingSegment;
use nix::unistd::Pid;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Reader attached to an existing ring.
///
/// Registers itself on attach and deregisters on drop. A reader that stops
/// calling into the ring for longer than the ring's reader timeout is purged
/// by the writer and gets `InvalidParameter` from then on.
#[derive(Debug)]
pub struct RingReader {
    segment: RingSegment,
    pid: Pid,
    slots_read: u64,
}

impl RingReader {
    /// Attach to ring `name` as the calling process.
    pub fn attach(name: &str) -> RingResult<Self> {
        Self::attach_as(name, current_pid())
    }

    /// Attach to ring `name` under an explicit reader id.
    ///
    /// Useful when one process hosts several independent consumers.
    pub fn attach_as(name: &str, pid: Pid) -> RingResult<Self> {
        Self::register(RingSegment::attach(name)?, pid)
    }

    /// Attach to the ring backed by the file at `path`.
    pub fn attach_at(name: &str, path: &Path, pid: Pid) -> RingResult<Self> {
        Self::register(RingSegment::attach_at(name, path)?, pid)
    }

    fn register(segment: RingSegment, pid: Pid) -> RingResult<Self> {
        segment.ring().add_reader(pid)?;
        debug!("Reader {} attached to {}", pid, segment.name());
        Ok(Self {
            segment,
            pid,
            slots_read: 0,
        })
    }

    /// Open a read transaction for up to `max_slots` slots, hand the granted
    /// bytes to `consume` and release every granted slot.
    ///
    /// Returns the number of consumed slots; `consume` is not called for an
    /// empty grant.
    pub fn read_with<F>(&mut self, max_slots: u32, consume: F) -> RingResult<u32>
    where
        F: FnOnce(&[u8]),
    {
        let ring = self.segment.ring();
        let grant = ring.begin_access(Access::Read, self.pid, max_slots)?;
        if !grant.is_empty() {
            match self.segment.slot_bytes(grant.offset, grant.num_slots) {
                Ok(bytes) => consume(bytes),
                Err(e) => {
                    // Close the transaction without consuming anything.
                    ring.end_access(Access::Read, self.pid, grant.offset, 0)?;
                    return Err(e);
                }
            }
        }
        ring.end_access(Access::Read, self.pid, grant.offset, grant.num_slots)?;
        self.slots_read += u64::from(grant.num_slots);
        Ok(grant.num_slots)
    }

    /// Copy up to `max_slots` slots out of the ring, one `Vec` per slot.
    pub fn read_frames(&mut self, max_slots: u32) -> RingResult<Vec<Vec<u8>>> {
        let slot_size = self.ring().slot_size() as usize;
        let mut frames = Vec::new();
        while (frames.len() as u32) < max_slots {
            let wanted = max_slots - frames.len() as u32;
            let got = self.read_with(wanted, |bytes| {
                frames.extend(bytes.chunks_exact(slot_size).map(<[u8]>::to_vec));
            })?;
            if got == 0 {
                break;
            }
        }
        Ok(frames)
    }

    /// Block until `num_slots` unread slots exist or `timeout` passes.
    pub fn wait(&self, num_slots: u32, timeout: Duration) -> RingResult<()> {
        self.ring().wait_read(self.pid, num_slots, timeout)
    }

    /// Unread slots for this reader.
    pub fn available(&self) -> RingResult<u32> {
        self.ring().update_available(Access::Read, self.pid)
    }

    /// Shared ring core.
    pub fn ring(&self) -> &ShmRingBuffer {
        self.segment.ring()
    }

    /// Reader id registered in the ring.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Ring name.
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Slots consumed through this handle.
    pub fn slots_read(&self) -> u64 {
        self.slots_read
    }
}

impl Drop for RingReader {
    fn drop(&mut self) {
        if let Err(e) = self.ring().remove_reader(self.pid) {
            // Already purged by the writer, or the ring is gone.
            warn!("Reader {} could not deregister from {}: {}", self.pid, self.name(), e);
        }
    }
}
