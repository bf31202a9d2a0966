//! Fixed-capacity reader table
//!
//! Every consumer process owns one [`ReaderSlot`] identified by its pid. A
//! slot holds the reader's own cursor, the grant of its open read transaction
//! and a liveness timestamp. The table lives inside the shared segment, so it
//! is a plain array of atomics with no heap pointers.
//!
//! Mutating methods (`claim`, `release`, `reset_offsets`, `purge_stale`)
//! must be called with the reader-table lock of the owning ring held.

use crate::clock::is_stale;
use nix::unistd::Pid;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info};
use vring::consts::MAX_READERS;

/// One reader's bookkeeping. `pid == 0` marks a free slot.
#[repr(C)]
#[derive(Debug, Default)]
pub struct ReaderSlot {
    pid: AtomicI32,
    offset: AtomicU32,
    allowed_to_read: AtomicU32,
    last_access: AtomicU64,
}

impl ReaderSlot {
    /// Owning reader, `None` if the slot is free.
    pub fn pid(&self) -> Option<Pid> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }

    /// True if the slot is owned by `pid`.
    #[inline]
    pub fn is_owned_by(&self, pid: Pid) -> bool {
        self.pid.load(Ordering::Acquire) == pid.as_raw()
    }

    /// Reader cursor. May equal the slot count right after a full lap.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, num_slots: u32) -> u32 {
        self.offset.fetch_add(num_slots, Ordering::AcqRel) + num_slots
    }

    /// Grant of the open read transaction, 0 when none is open.
    #[inline]
    pub fn allowed_to_read(&self) -> u32 {
        self.allowed_to_read.load(Ordering::Acquire)
    }

    pub(crate) fn set_allowed_to_read(&self, num_slots: u32) {
        self.allowed_to_read.store(num_slots, Ordering::Release);
    }

    /// Monotonic ns of the reader's last sign of life.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    pub(crate) fn touch(&self, now: u64) {
        self.last_access.store(now, Ordering::Release);
    }

    fn clear(&self) {
        self.offset.store(0, Ordering::Release);
        self.allowed_to_read.store(0, Ordering::Release);
        self.last_access.store(0, Ordering::Release);
        self.pid.store(0, Ordering::Release);
    }
}

/// Why a reader could not be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// The pid already owns a slot.
    Duplicate,
    /// Every slot is taken.
    Full,
}

/// Fixed array of [`ReaderSlot`]s.
#[repr(C)]
#[derive(Debug, Default)]
pub struct ReaderTable {
    slots: [ReaderSlot; MAX_READERS],
}

impl ReaderTable {
    /// Number of slots in the table.
    pub const CAPACITY: usize = MAX_READERS;

    /// Index of the slot owned by `pid`.
    pub fn position(&self, pid: Pid) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_owned_by(pid))
    }

    /// Slot at `index`, bounds-checked.
    pub fn slot(&self, index: usize) -> Option<&ReaderSlot> {
        self.slots.get(index)
    }

    /// Slot owned by `pid`.
    pub fn find(&self, pid: Pid) -> Option<&ReaderSlot> {
        self.position(pid).and_then(|index| self.slot(index))
    }

    /// Occupied slots.
    pub fn active(&self) -> impl Iterator<Item = &ReaderSlot> {
        self.slots.iter().filter(|slot| slot.pid().is_some())
    }

    /// Number of registered readers.
    pub fn len(&self) -> usize {
        self.active().count()
    }

    /// True if no reader is registered.
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Register `pid` in the first free slot, starting at `offset`.
    pub fn claim(&self, pid: Pid, offset: u32, now: u64) -> Result<usize, ClaimError> {
        if self.position(pid).is_some() {
            return Err(ClaimError::Duplicate);
        }
        let index = self
            .slots
            .iter()
            .position(|slot| slot.pid().is_none())
            .ok_or(ClaimError::Full)?;

        let slot = &self.slots[index];
        slot.offset.store(offset, Ordering::Release);
        slot.allowed_to_read.store(0, Ordering::Release);
        slot.last_access.store(now, Ordering::Release);
        slot.pid.store(pid.as_raw(), Ordering::Release);
        Ok(index)
    }

    /// Zero the slot owned by `pid`. Returns false if `pid` owns none.
    pub fn release(&self, pid: Pid) -> bool {
        match self.find(pid) {
            Some(slot) => {
                slot.clear();
                true
            }
            None => false,
        }
    }

    /// Smallest cursor among registered readers, `None` without readers.
    pub fn min_offset(&self) -> Option<u32> {
        self.active().map(ReaderSlot::offset).min()
    }

    /// Fold every registered reader back to the start of the ring.
    pub fn reset_offsets(&self) {
        for slot in self.active() {
            slot.offset.store(0, Ordering::Release);
        }
    }

    /// Zero every slot whose reader has been silent for more than
    /// `timeout_ns`. Returns the number of purged readers.
    pub fn purge_stale(&self, now: u64, timeout_ns: u64) -> usize {
        let mut purged = 0;
        for slot in self.active() {
            let last_access = slot.last_access();
            if is_stale(last_access, now, timeout_ns) {
                info!(
                    "Purging reader {} after {} ns without activity",
                    slot.pid.load(Ordering::Acquire),
                    now - last_access
                );
                slot.clear();
                purged += 1;
            }
        }
        if purged > 0 {
            debug!("{} reader(s) left after purge", self.len());
        }
        purged
    }
}
