//! Monotonic timestamps for reader/writer liveness and timed waits
//!
//! All timestamps stored in the shared segment are `CLOCK_MONOTONIC`
//! nanoseconds, which are comparable across processes on the same host.

use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use std::time::Duration;
use vring::consts::NSEC_PER_SEC;

/// Current `CLOCK_MONOTONIC` time as a `TimeSpec`.
pub fn monotonic_timespec() -> nix::Result<TimeSpec> {
    clock_gettime(ClockId::CLOCK_MONOTONIC)
}

/// Current monotonic time in nanoseconds.
///
/// Returns 0 if the clock cannot be read; a zero timestamp never counts as
/// stale in [`is_stale`].
pub fn now_ns() -> u64 {
    monotonic_timespec().map(|ts| timespec_to_ns(&ts)).unwrap_or(0)
}

/// Convert a `TimeSpec` to nanoseconds.
pub fn timespec_to_ns(ts: &TimeSpec) -> u64 {
    (ts.tv_sec() as u64)
        .saturating_mul(NSEC_PER_SEC)
        .saturating_add(ts.tv_nsec() as u64)
}

/// Latest deadline handed out; its nanosecond count still fits in `i64`.
const MAX_DEADLINE_SECS: i64 = (i64::MAX as u64 / NSEC_PER_SEC) as i64;

/// Absolute monotonic deadline `timeout` from now, for `pthread_cond_timedwait`.
///
/// Saturates about 292 years after boot, so `Duration::MAX` means "practically never".
pub fn deadline_after(timeout: Duration) -> nix::Result<TimeSpec> {
    let now = monotonic_timespec()?;
    let mut nsec = now.tv_nsec() + i64::from(timeout.subsec_nanos());
    let mut carry = 0;
    if nsec >= NSEC_PER_SEC as i64 {
        nsec -= NSEC_PER_SEC as i64;
        carry = 1;
    }

    let secs = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
    let sec = now.tv_sec().saturating_add(secs).saturating_add(carry);
    if sec >= MAX_DEADLINE_SECS {
        return Ok(TimeSpec::new(MAX_DEADLINE_SECS, 0));
    }
    Ok(TimeSpec::new(sec, nsec))
}

/// True if more than `timeout_ns` elapsed between `last_access` and `now`.
///
/// A clock that went backwards (or a zero `now`) is never stale.
#[inline]
pub fn is_stale(last_access: u64, now: u64, timeout_ns: u64) -> bool {
    now > last_access && now - last_access > timeout_ns
}
