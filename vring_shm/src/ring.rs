//! Ring buffer core
//!
//! [`ShmRingBuffer`] is the shared state of one single-writer, multi-reader
//! slot ring. It holds no pointers: payload bytes live in a slot arena
//! described by a [`DataRegion`], and every field is an atomic or a
//! process-shared pthread object, so the structure can sit inside a shared
//! segment and be used through `&self` from any process mapping it.
//!
//! # Protocol
//!
//! ```text
//!  writer                                  reader (one per pid)
//!  ------                                  --------------------
//!  wait_write(n, t)                        add_reader(pid)
//!  begin_access(Write, pid, n) -> grant    wait_read(pid, n, t)
//!  ... fill grant.offset.. slots ...       begin_access(Read, pid, n) -> grant
//!  end_access(Write, pid, off, k)          ... consume slots ...
//!     publishes write_offset/fill_level    end_access(Read, pid, off, k)
//!     wakes readers, purges dead ones         advances own cursor, aggregates
//! ```
//!
//! `fill_level` is measured from the slowest reader (`read_offset`). One slot
//! is always kept free between the write cursor and `read_offset`, so equal
//! cursors unambiguously mean "empty".
//!
//! # Locking
//!
//! The general lock guards cursors, fill level and wait thresholds; the
//! reader lock guards the reader table. When both are needed the general
//! lock is taken first. The write transaction itself is a single atomic flag.

use crate::clock::{deadline_after, now_ns};
use crate::error::{RingError, RingResult};
use crate::monitoring::{ReaderStatus, RingStatus};
use crate::readers::{ClaimError, ReaderSlot, ReaderTable};
use crate::sync::{ShmCondvar, ShmMutex, ShmMutexGuard, WaitOutcome};
use nix::unistd::Pid;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use vring::consts::{MAX_READERS, READER_TIMEOUT_NS};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// Location of the slot arena, in bytes relative to the segment base.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataRegion {
    /// Byte offset of slot 0.
    pub offset: u64,
    /// Arena length in bytes.
    pub len: u64,
}

impl DataRegion {
    /// Arena starting at `offset` spanning `len` bytes.
    pub const fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// True if the arena has no bytes.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Side of the ring a call acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Consumer side, identified by the reader's pid.
    Read,
    /// Producer side.
    Write,
}

/// Contiguous slot range handed out by `begin_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// First granted slot.
    pub offset: u32,
    /// Number of granted slots; may be 0.
    pub num_slots: u32,
}

impl Grant {
    /// True if nothing was granted.
    pub const fn is_empty(&self) -> bool {
        self.num_slots == 0
    }
}

/// Shared ring state. See the module docs for the protocol.
#[repr(C, align(64))]
pub struct ShmRingBuffer {
    state: AtomicU8,
    process_shared: AtomicBool,
    write_in_progress: AtomicBool,
    slot_size: AtomicU32,
    slot_count: AtomicU32,
    read_offset: AtomicU32,
    write_offset: AtomicU32,
    fill_level: AtomicU32,
    read_wait_level: AtomicU32,
    write_wait_level: AtomicU32,
    allowed_to_write: AtomicU32,
    data_offset: AtomicU64,
    data_len: AtomicU64,
    writer_last_access: AtomicU64,
    reader_timeout_ns: AtomicU64,
    general: ShmMutex,
    readers_lock: ShmMutex,
    write_ready: ShmCondvar,
    read_ready: ShmCondvar,
    readers: ReaderTable,
}

impl std::fmt::Debug for ShmRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmRingBuffer")
            .field("initialized", &self.is_initialized())
            .field("slot_size", &self.slot_size())
            .field("slot_count", &self.slot_count())
            .field("read_offset", &self.read_offset())
            .field("write_offset", &self.write_offset())
            .field("fill_level", &self.fill_level())
            .field("readers", &self.readers.len())
            .finish()
    }
}

impl ShmRingBuffer {
    /// Zero the memory at `this` and return a reference to the resulting
    /// uninitialised ring.
    ///
    /// # Safety
    ///
    /// `this` must be valid for writes of `size_of::<Self>()` bytes, aligned
    /// for `Self`, not in use by any other thread or process, and it must stay
    /// mapped and unmoved for `'a`.
    pub unsafe fn init_in_place<'a>(this: *mut Self) -> &'a Self {
        unsafe {
            std::ptr::write_bytes(this, 0, 1);
            &*this
        }
    }

    /// Reinterpret already initialised shared memory as a ring.
    ///
    /// # Safety
    ///
    /// `this` must point to a ring set up through [`init_in_place`](Self::init_in_place)
    /// and stay mapped and unmoved for `'a`.
    pub unsafe fn from_raw<'a>(this: *const Self) -> &'a Self {
        unsafe { &*this }
    }

    /// Heap-allocated uninitialised ring, for single-process use and tests.
    pub fn new_boxed() -> Box<Self> {
        // SAFETY: every field is an atomic or a C struct of plain integers,
        // for which all-zero bytes are a valid value.
        unsafe { Box::<Self>::new_zeroed().assume_init() }
    }

    /// Bind geometry and the slot arena, and set up the lock set.
    ///
    /// `shared` selects process-shared locks; pass `false` only when every
    /// user lives in the calling process. A ring is initialised once; a
    /// second call fails with `NotAllowed`.
    pub fn init(
        &self,
        slot_size: u32,
        slot_count: u32,
        data: DataRegion,
        shared: bool,
    ) -> RingResult<()> {
        if slot_size == 0 {
            return Err(RingError::invalid("slot_size must be non-zero"));
        }
        if slot_count == 0 {
            return Err(RingError::invalid("slot_count must be non-zero"));
        }
        if data.is_empty() {
            return Err(RingError::invalid("data region is empty"));
        }
        if data.len < u64::from(slot_size) * u64::from(slot_count) {
            return Err(RingError::invalid("data region smaller than slot_size * slot_count"));
        }
        if self
            .state
            .compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingError::NotAllowed {
                what: "ring buffer already initialized",
            });
        }

        // SAFETY: the state flag makes this thread the only user of the
        // primitives until READY is published.
        let primitives = unsafe {
            self.general
                .init(shared)
                .and_then(|()| self.readers_lock.init(shared))
                .and_then(|()| self.write_ready.init(shared))
                .and_then(|()| self.read_ready.init(shared))
        };
        if let Err(e) = primitives {
            self.state.store(UNINIT, Ordering::Release);
            return Err(e.into());
        }

        self.process_shared.store(shared, Ordering::Relaxed);
        self.slot_size.store(slot_size, Ordering::Relaxed);
        self.slot_count.store(slot_count, Ordering::Relaxed);
        self.data_offset.store(data.offset, Ordering::Relaxed);
        self.data_len.store(data.len, Ordering::Relaxed);
        self.read_offset.store(0, Ordering::Relaxed);
        self.write_offset.store(0, Ordering::Relaxed);
        self.fill_level.store(0, Ordering::Relaxed);
        self.read_wait_level.store(slot_count, Ordering::Relaxed);
        self.write_wait_level.store(0, Ordering::Relaxed);
        self.allowed_to_write.store(0, Ordering::Relaxed);
        self.writer_last_access.store(now_ns(), Ordering::Relaxed);
        self.reader_timeout_ns.store(READER_TIMEOUT_NS, Ordering::Relaxed);
        self.state.store(READY, Ordering::Release);

        info!(
            "Ring initialized: {} slots of {} bytes, arena {}+{}, shared={}",
            slot_count, slot_size, data.offset, data.len, shared
        );
        Ok(())
    }

    /// Slots currently available: the reader's own level for `Read`, free
    /// space relative to the slowest reader for `Write`.
    pub fn update_available(&self, access: Access, pid: Pid) -> RingResult<u32> {
        self.ensure_initialized()?;
        match access {
            Access::Write => Ok(self.slot_count() - self.fill_level()),
            Access::Read => {
                let _readers = self.readers_lock.lock()?;
                let slot = self.reader_slot(pid)?;
                Ok(self.reader_level(slot.offset()))
            }
        }
    }

    /// Open a transaction for up to `requested` slots.
    ///
    /// A write grant never crosses the end of the arena and never reaches the
    /// slot before `read_offset`. A read grant never exceeds the reader's own
    /// level nor crosses the end of the arena. Only one write transaction can
    /// be open; a second `begin_access(Write, ..)` fails with `NotAllowed`.
    pub fn begin_access(&self, access: Access, pid: Pid, requested: u32) -> RingResult<Grant> {
        self.ensure_initialized()?;
        match access {
            Access::Write => self.begin_write(pid, requested),
            Access::Read => self.begin_read(pid, requested),
        }
    }

    /// Commit `num_slots` slots of the open transaction.
    pub fn end_access(
        &self,
        access: Access,
        pid: Pid,
        offset: u32,
        num_slots: u32,
    ) -> RingResult<()> {
        self.ensure_initialized()?;
        match access {
            Access::Write => self.end_write(pid, offset, num_slots),
            Access::Read => self.end_read(pid, num_slots),
        }
    }

    fn begin_write(&self, pid: Pid, requested: u32) -> RingResult<Grant> {
        if self
            .write_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingError::NotAllowed {
                what: "write transaction already open",
            });
        }

        let guard = match self.general.lock() {
            Ok(guard) => guard,
            Err(e) => {
                self.write_in_progress.store(false, Ordering::Release);
                return Err(e.into());
            }
        };
        let n = self.slot_count();
        let fill = self.fill_level();
        let w = self.write_offset();
        let r = self.read_offset();
        drop(guard);

        let mut granted = requested
            .min(n - fill)
            .min(n - w)
            .min((n - 1).saturating_sub(fill));
        if w < r {
            granted = granted.min(r - w - 1);
        }

        self.allowed_to_write.store(granted, Ordering::Release);
        self.writer_last_access.store(now_ns(), Ordering::Release);
        debug!(
            "Write begin by {}: requested {} granted {} at {} (fill {}, read {})",
            pid, requested, granted, w, fill, r
        );
        Ok(Grant {
            offset: w,
            num_slots: granted,
        })
    }

    fn end_write(&self, pid: Pid, offset: u32, num_slots: u32) -> RingResult<()> {
        if !self.write_in_progress.load(Ordering::Acquire) {
            return Err(RingError::invalid("no write transaction open"));
        }

        {
            let _general = self.general.lock()?;
            let n = self.slot_count();
            let w = self.write_offset();
            if num_slots > self.allowed_to_write.load(Ordering::Acquire) {
                return Err(RingError::invalid("num_slots exceeds write grant"));
            }
            if u64::from(offset) + u64::from(num_slots) > u64::from(n) {
                return Err(RingError::invalid("write range crosses end of ring"));
            }
            if w + num_slots > n {
                return Err(RingError::invalid("write offset overflows slot count"));
            }

            let next = if w + num_slots == n { 0 } else { w + num_slots };
            let fill = self.fill_level() + num_slots;
            self.allowed_to_write.store(0, Ordering::Release);
            self.write_offset.store(next, Ordering::Release);
            self.fill_level.store(fill, Ordering::Release);
            self.write_in_progress.store(false, Ordering::Release);

            if fill >= self.read_wait_level.load(Ordering::Acquire) {
                self.broadcast(&self.read_ready, "read_ready");
            }
            self.writer_last_access.store(now_ns(), Ordering::Release);
            debug!(
                "Write end by {}: {} slots at {}, write offset {} fill {}",
                pid, num_slots, offset, next, fill
            );
        }

        self.purge_stale_readers();
        Ok(())
    }

    fn begin_read(&self, pid: Pid, requested: u32) -> RingResult<Grant> {
        let _readers = self.readers_lock.lock()?;
        let slot = self.reader_slot(pid)?;
        let n = self.slot_count();
        let own = slot.offset();
        let level = self.reader_level(own);
        let granted = requested.min(level).min(n - own);

        slot.set_allowed_to_read(granted);
        slot.touch(now_ns());
        debug!(
            "Read begin by {}: requested {} granted {} at {} (level {})",
            pid, requested, granted, own, level
        );
        Ok(Grant {
            offset: own % n,
            num_slots: granted,
        })
    }

    fn end_read(&self, pid: Pid, num_slots: u32) -> RingResult<()> {
        {
            let _readers = self.readers_lock.lock()?;
            let slot = self.reader_slot(pid)?;
            if num_slots > slot.allowed_to_read() {
                return Err(RingError::invalid("num_slots exceeds read grant"));
            }
            slot.set_allowed_to_read(0);
            let own = slot.advance(num_slots);
            slot.touch(now_ns());
            debug!("Read end by {}: {} slots, own offset {}", pid, num_slots, own);
        }

        let general = self.general.lock()?;
        self.aggregate(&general)?;
        self.notify_writer(&general);
        Ok(())
    }

    /// Block until at least `num_slots` slots are free, or `timeout` passes.
    pub fn wait_write(&self, num_slots: u32, timeout: Duration) -> RingResult<()> {
        self.ensure_initialized()?;
        let n = self.slot_count();
        if num_slots == 0 || num_slots > n {
            return Err(RingError::invalid("num_slots must be in 1..=slot_count"));
        }
        if timeout.is_zero() {
            return Err(RingError::invalid("timeout must be non-zero"));
        }

        let deadline = deadline_after(timeout)?;
        let threshold = n - num_slots;
        let mut general = self.general.lock()?;
        self.write_wait_level.store(threshold, Ordering::Release);

        while self.fill_level() > threshold {
            let outcome = self.write_ready.wait_until(&mut general, &deadline);
            if let Some(result) = settle(outcome, || Ok(self.fill_level() <= threshold)) {
                if let Err(RingError::TimedOut) = result {
                    debug!("Write wait for {} slots timed out", num_slots);
                }
                return result;
            }
        }
        Ok(())
    }

    /// Block until reader `pid` has at least `num_slots` unread slots, or
    /// `timeout` passes. Every wake refreshes the reader's liveness stamp.
    pub fn wait_read(&self, pid: Pid, num_slots: u32, timeout: Duration) -> RingResult<()> {
        self.ensure_initialized()?;
        let n = self.slot_count();
        if num_slots == 0 || num_slots > n {
            return Err(RingError::invalid("num_slots must be in 1..=slot_count"));
        }
        if timeout.is_zero() {
            return Err(RingError::invalid("timeout must be non-zero"));
        }
        self.reader_slot(pid)?;

        let deadline = deadline_after(timeout)?;
        let mut general = self.general.lock()?;
        self.read_wait_level.fetch_min(num_slots, Ordering::AcqRel);

        loop {
            if self.touch_and_level(pid)? >= num_slots {
                return Ok(());
            }
            let outcome = self.read_ready.wait_until(&mut general, &deadline);
            if let Some(result) =
                settle(outcome, || Ok(self.touch_and_level(pid)? >= num_slots))
            {
                if let Err(RingError::TimedOut) = result {
                    debug!("Read wait by {} for {} slots timed out", pid, num_slots);
                }
                return result;
            }
        }
    }

    /// Register reader `pid`, starting at the slowest reader's cursor.
    pub fn add_reader(&self, pid: Pid) -> RingResult<()> {
        self.ensure_initialized()?;
        check_pid(pid)?;

        let _general = self.general.lock()?;
        let _readers = self.readers_lock.lock()?;
        let start = self.read_offset();
        match self.readers.claim(pid, start, now_ns()) {
            Ok(index) => {
                info!("Reader {} registered in slot {} at offset {}", pid, index, start);
                Ok(())
            }
            Err(ClaimError::Duplicate) => Err(RingError::invalid("reader pid already registered")),
            Err(ClaimError::Full) => Err(RingError::TooManyReaders {
                capacity: MAX_READERS,
            }),
        }
    }

    /// Deregister reader `pid` and let the fill level follow the remaining readers.
    pub fn remove_reader(&self, pid: Pid) -> RingResult<()> {
        self.ensure_initialized()?;
        check_pid(pid)?;

        let general = self.general.lock()?;
        {
            let _readers = self.readers_lock.lock()?;
            if !self.readers.release(pid) {
                return Err(RingError::invalid("unknown reader pid"));
            }
        }
        info!("Reader {} removed", pid);
        self.aggregate(&general)?;
        self.notify_writer(&general);
        Ok(())
    }

    /// Liveness threshold after which a silent reader is purged.
    pub fn set_reader_timeout(&self, timeout: Duration) -> RingResult<()> {
        self.ensure_initialized()?;
        if timeout.is_zero() {
            return Err(RingError::invalid("reader timeout must be non-zero"));
        }
        let ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        self.reader_timeout_ns.store(ns, Ordering::Release);
        debug!("Reader timeout set to {:?}", timeout);
        Ok(())
    }

    /// Byte range of `num_slots` slots starting at `offset`, relative to the
    /// segment base.
    pub fn slot_byte_range(&self, offset: u32, num_slots: u32) -> RingResult<Range<u64>> {
        self.ensure_initialized()?;
        if u64::from(offset) + u64::from(num_slots) > u64::from(self.slot_count()) {
            return Err(RingError::invalid("slot range crosses end of ring"));
        }
        let slot_size = u64::from(self.slot_size());
        let start = self.data_offset.load(Ordering::Acquire) + u64::from(offset) * slot_size;
        Ok(start..start + u64::from(num_slots) * slot_size)
    }

    /// Snapshot of cursors, levels and registered readers.
    pub fn status(&self) -> RingResult<RingStatus> {
        self.ensure_initialized()?;
        let now = now_ns();
        let general = self.general.lock()?;
        let readers_guard = self.readers_lock.lock()?;
        let readers = self
            .readers
            .active()
            .filter_map(|slot| {
                Some(ReaderStatus {
                    pid: slot.pid()?.as_raw(),
                    offset: slot.offset(),
                    level: self.reader_level(slot.offset()),
                    allowed_to_read: slot.allowed_to_read(),
                    idle_ns: now.saturating_sub(slot.last_access()),
                })
            })
            .collect();
        drop(readers_guard);
        drop(general);

        Ok(RingStatus {
            slot_size: self.slot_size(),
            slot_count: self.slot_count(),
            read_offset: self.read_offset(),
            write_offset: self.write_offset(),
            fill_level: self.fill_level(),
            write_in_progress: self.write_in_progress(),
            allowed_to_write: self.allowed_to_write.load(Ordering::Acquire),
            writer_idle_ns: now.saturating_sub(self.writer_last_access.load(Ordering::Acquire)),
            reader_timeout_ns: self.reader_timeout_ns.load(Ordering::Acquire),
            max_readers: MAX_READERS,
            readers,
        })
    }

    /// True once `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// True if the locks were set up process-shared.
    pub fn is_process_shared(&self) -> bool {
        self.process_shared.load(Ordering::Acquire)
    }

    /// True while a write transaction is open.
    pub fn write_in_progress(&self) -> bool {
        self.write_in_progress.load(Ordering::Acquire)
    }

    /// Payload bytes per slot.
    pub fn slot_size(&self) -> u32 {
        self.slot_size.load(Ordering::Acquire)
    }

    /// Number of slots.
    pub fn slot_count(&self) -> u32 {
        self.slot_count.load(Ordering::Acquire)
    }

    /// Slowest reader's cursor.
    pub fn read_offset(&self) -> u32 {
        self.read_offset.load(Ordering::Acquire)
    }

    /// Writer cursor.
    pub fn write_offset(&self) -> u32 {
        self.write_offset.load(Ordering::Acquire)
    }

    /// Occupied slots relative to the slowest reader.
    pub fn fill_level(&self) -> u32 {
        self.fill_level.load(Ordering::Acquire)
    }

    /// Arena location bound at `init`.
    pub fn data_region(&self) -> DataRegion {
        DataRegion {
            offset: self.data_offset.load(Ordering::Acquire),
            len: self.data_len.load(Ordering::Acquire),
        }
    }

    /// Point the ring at a different arena, e.g. one outside the mapping.
    #[cfg(test)]
    pub(crate) fn rebind_data_region(&self, data: DataRegion) {
        self.data_offset.store(data.offset, Ordering::Release);
        self.data_len.store(data.len, Ordering::Release);
    }

    /// Current liveness threshold.
    pub fn reader_timeout(&self) -> Duration {
        Duration::from_nanos(self.reader_timeout_ns.load(Ordering::Acquire))
    }

    /// Own cursor of reader `pid`, if registered.
    pub fn reader_offset(&self, pid: Pid) -> Option<u32> {
        self.readers.find(pid).map(ReaderSlot::offset)
    }

    /// Number of registered readers.
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    fn ensure_initialized(&self) -> RingResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(RingError::NotInitialized)
        }
    }

    fn reader_slot(&self, pid: Pid) -> RingResult<&ReaderSlot> {
        check_pid(pid)?;
        self.readers
            .find(pid)
            .ok_or(RingError::invalid("unknown reader pid"))
    }

    /// Unread slots for a reader whose cursor is `own`. A stale write
    /// cursor can only under-report.
    fn reader_level(&self, own: u32) -> u32 {
        let w = self.write_offset();
        if w >= own {
            w - own
        } else {
            self.slot_count() - own + w
        }
    }

    fn touch_and_level(&self, pid: Pid) -> RingResult<u32> {
        let _readers = self.readers_lock.lock()?;
        let slot = self
            .readers
            .find(pid)
            .ok_or(RingError::invalid("reader removed while waiting"))?;
        slot.touch(now_ns());
        Ok(self.reader_level(slot.offset()))
    }

    /// Move `read_offset` to the slowest reader and shrink `fill_level` by
    /// what that reader consumed. Requires the general lock.
    fn aggregate(&self, _general: &ShmMutexGuard<'_>) -> RingResult<()> {
        let _readers = self.readers_lock.lock()?;
        let Some(slowest) = self.readers.min_offset() else {
            return Ok(());
        };
        let n = self.slot_count();
        let previous = self.read_offset();

        if slowest == n {
            self.readers.reset_offsets();
            self.read_offset.store(0, Ordering::Release);
        } else {
            self.read_offset.store(slowest, Ordering::Release);
        }

        let consumed = slowest.saturating_sub(previous);
        let fill = self.fill_level();
        if slowest < previous || consumed > fill {
            warn!(
                "Aggregation out of step: slowest {} previous {} fill {}",
                slowest, previous, fill
            );
        }
        self.fill_level
            .store(fill.saturating_sub(consumed), Ordering::Release);
        Ok(())
    }

    fn notify_writer(&self, _general: &ShmMutexGuard<'_>) {
        if self.fill_level() <= self.write_wait_level.load(Ordering::Acquire) {
            self.broadcast(&self.write_ready, "write_ready");
        }
    }

    fn broadcast(&self, cond: &ShmCondvar, name: &str) {
        if let Err(e) = cond.broadcast() {
            warn!("Broadcast on {} failed: {}", name, e);
        }
    }

    /// Zero every reader slot that has been silent past the timeout.
    fn purge_stale_readers(&self) {
        let timeout_ns = self.reader_timeout_ns.load(Ordering::Acquire);
        let general = match self.general.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Skipping reader purge, general lock failed: {}", e);
                return;
            }
        };
        let purged = match self.readers_lock.lock() {
            Ok(_readers) => self.readers.purge_stale(now_ns(), timeout_ns),
            Err(e) => {
                warn!("Skipping reader purge, reader lock failed: {}", e);
                return;
            }
        };
        if purged > 0 {
            if let Err(e) = self.aggregate(&general) {
                warn!("Aggregation after purge failed: {}", e);
            }
            self.notify_writer(&general);
        }
    }
}

/// Decide what one condvar wake means for a wait loop.
///
/// `None` keeps waiting. A timeout still succeeds when `satisfied` reports
/// the predicate now holds; any other condvar failure is `CondWaitFailed`.
fn settle<F>(outcome: nix::Result<WaitOutcome>, satisfied: F) -> Option<RingResult<()>>
where
    F: FnOnce() -> RingResult<bool>,
{
    match outcome {
        Ok(WaitOutcome::Signaled) => None,
        Ok(WaitOutcome::TimedOut) => Some(match satisfied() {
            Ok(true) => Ok(()),
            Ok(false) => Err(RingError::TimedOut),
            Err(e) => Err(e),
        }),
        Err(source) => Some(Err(RingError::CondWaitFailed { source })),
    }
}

fn check_pid(pid: Pid) -> RingResult<()> {
    if pid.as_raw() > 0 {
        Ok(())
    } else {
        Err(RingError::invalid("reader pid must be positive"))
    }
}

static_assertions::const_assert_eq!(std::mem::align_of::<ShmRingBuffer>(), 64);
