//! Process-shared mutex and condition variable
//!
//! Thin wrappers over `pthread_mutex_t` / `pthread_cond_t` initialised with
//! `PTHREAD_PROCESS_SHARED`, so they keep working when the memory holding them
//! is mapped into several processes. Mutexes are robust: if a process dies
//! while holding one, the next locker recovers it instead of deadlocking.
//!
//! Both types are plain bytes until `init` runs on them in place, and must
//! never move afterwards; they are meant to live inside a `#[repr(C)]`
//! structure placed in a shared segment (or in a `Box` for single-process use).

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use tracing::warn;

fn check(code: libc::c_int) -> nix::Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Errno::from_raw(code))
    }
}

fn pshared(shared: bool) -> libc::c_int {
    if shared {
        libc::PTHREAD_PROCESS_SHARED
    } else {
        libc::PTHREAD_PROCESS_PRIVATE
    }
}

/// Robust, process-shared mutex.
#[repr(C)]
pub struct ShmMutex {
    raw: UnsafeCell<libc::pthread_mutex_t>,
}

// SAFETY: the pthread mutex is designed to be shared between threads and
// processes; all access goes through the pthread API.
unsafe impl Send for ShmMutex {}
unsafe impl Sync for ShmMutex {}

impl ShmMutex {
    /// Initialise the mutex in place. With `shared` set it works across
    /// every process mapping the memory, otherwise only inside this one.
    ///
    /// # Safety
    ///
    /// No thread or process may use the mutex while it is initialised, and
    /// `self` must not move for as long as the mutex is used.
    pub unsafe fn init(&self, shared: bool) -> nix::Result<()> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        unsafe {
            check(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
            let result = check(libc::pthread_mutexattr_setpshared(
                attr.as_mut_ptr(),
                pshared(shared),
            ))
            .and_then(|()| {
                check(libc::pthread_mutexattr_setrobust(
                    attr.as_mut_ptr(),
                    libc::PTHREAD_MUTEX_ROBUST,
                ))
            })
            .and_then(|()| {
                check(libc::pthread_mutex_init(self.raw.get(), attr.as_ptr()))
            });
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            result
        }
    }

    /// Acquire the mutex, blocking until it is available.
    ///
    /// If the previous owner died while holding it, the mutex is marked
    /// consistent and handed to the caller.
    pub fn lock(&self) -> nix::Result<ShmMutexGuard<'_>> {
        match unsafe { libc::pthread_mutex_lock(self.raw.get()) } {
            0 => {}
            libc::EOWNERDEAD => self.recover()?,
            code => return Err(Errno::from_raw(code)),
        }
        Ok(ShmMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Called with the lock held after `EOWNERDEAD`.
    fn recover(&self) -> nix::Result<()> {
        warn!("Owner of a shared ring lock died while holding it, recovering");
        let result = check(unsafe { libc::pthread_mutex_consistent(self.raw.get()) });
        if result.is_err() {
            unsafe { libc::pthread_mutex_unlock(self.raw.get()) };
        }
        result
    }
}

/// RAII guard of a locked [`ShmMutex`]; unlocks on drop.
///
/// Not `Send`: a pthread mutex must be unlocked by the thread that locked it.
pub struct ShmMutexGuard<'a> {
    mutex: &'a ShmMutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ShmMutexGuard<'_> {
    fn drop(&mut self) {
        unsafe { libc::pthread_mutex_unlock(self.mutex.raw.get()) };
    }
}

/// Result of a timed condition variable wait that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by a broadcast (or spuriously); re-check the predicate.
    Signaled,
    /// The absolute deadline passed.
    TimedOut,
}

/// Process-shared condition variable on `CLOCK_MONOTONIC`.
#[repr(C)]
pub struct ShmCondvar {
    raw: UnsafeCell<libc::pthread_cond_t>,
}

// SAFETY: see `ShmMutex`.
unsafe impl Send for ShmCondvar {}
unsafe impl Sync for ShmCondvar {}

impl ShmCondvar {
    /// Initialise the condition variable in place.
    ///
    /// # Safety
    ///
    /// Same requirements as [`ShmMutex::init`].
    pub unsafe fn init(&self, shared: bool) -> nix::Result<()> {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        unsafe {
            check(libc::pthread_condattr_init(attr.as_mut_ptr()))?;
            let result = check(libc::pthread_condattr_setpshared(
                attr.as_mut_ptr(),
                pshared(shared),
            ))
            .and_then(|()| {
                check(libc::pthread_condattr_setclock(
                    attr.as_mut_ptr(),
                    libc::CLOCK_MONOTONIC,
                ))
            })
            .and_then(|()| {
                check(libc::pthread_cond_init(self.raw.get(), attr.as_ptr()))
            });
            libc::pthread_condattr_destroy(attr.as_mut_ptr());
            result
        }
    }

    /// Atomically release `guard`'s mutex and wait for a broadcast or until
    /// the absolute monotonic `deadline`. The mutex is held again on return.
    pub fn wait_until(
        &self,
        guard: &mut ShmMutexGuard<'_>,
        deadline: &TimeSpec,
    ) -> nix::Result<WaitOutcome> {
        let mutex = guard.mutex;
        let deadline: &libc::timespec = deadline.as_ref();
        match unsafe { libc::pthread_cond_timedwait(self.raw.get(), mutex.raw.get(), deadline) } {
            0 => Ok(WaitOutcome::Signaled),
            libc::ETIMEDOUT => Ok(WaitOutcome::TimedOut),
            libc::EOWNERDEAD => {
                mutex.recover()?;
                Ok(WaitOutcome::Signaled)
            }
            code => Err(Errno::from_raw(code)),
        }
    }

    /// Wake every waiter.
    pub fn broadcast(&self) -> nix::Result<()> {
        check(unsafe { libc::pthread_cond_broadcast(self.raw.get()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::deadline_after;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    #[repr(C)]
    struct Pair {
        mutex: ShmMutex,
        cond: ShmCondvar,
        flag: AtomicBool,
    }

    fn new_pair() -> Box<Pair> {
        // All-zero bytes are a valid (uninitialised) pthread object.
        let pair = unsafe { Box::<Pair>::new_zeroed().assume_init() };
        unsafe {
            pair.mutex.init(true).unwrap();
            pair.cond.init(true).unwrap();
        }
        pair
    }

    #[test]
    fn lock_and_relock() {
        let pair = new_pair();
        {
            let _guard = pair.mutex.lock().unwrap();
        }
        let _guard = pair.mutex.lock().unwrap();
    }

    #[test]
    fn wait_reports_timeout() {
        let pair = new_pair();
        let mut guard = pair.mutex.lock().unwrap();
        let start = Instant::now();
        let deadline = deadline_after(Duration::from_millis(30)).unwrap();

        let mut outcome = WaitOutcome::Signaled;
        while outcome == WaitOutcome::Signaled {
            outcome = pair.cond.wait_until(&mut guard, &deadline).unwrap();
        }

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn broadcast_wakes_waiter() {
        let pair = Arc::new(new_pair());
        let waiter = {
            let pair = Arc::clone(&pair);
            std::thread::spawn(move || {
                let mut guard = pair.mutex.lock().unwrap();
                let deadline = deadline_after(Duration::from_secs(5)).unwrap();
                while !pair.flag.load(Ordering::Acquire) {
                    let outcome = pair.cond.wait_until(&mut guard, &deadline).unwrap();
                    if outcome == WaitOutcome::TimedOut {
                        return false;
                    }
                }
                true
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        {
            let _guard = pair.mutex.lock().unwrap();
            pair.flag.store(true, Ordering::Release);
            pair.cond.broadcast().unwrap();
        }

        assert!(waiter.join().unwrap());
    }
}
