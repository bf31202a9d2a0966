//! Multi-process tests.
//!
//! Uses `fork()` so that writer and readers really live in separate address
//! spaces and only share the segment:
//! - a child reader consumes frames produced by the parent
//! - a reader that dies without deregistering is purged by the writer
//! - a lock held by a dead process is recovered

use nix::unistd::Pid;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use vring_shm::platform::{MapConfig, create_segment_mmap};
use vring_shm::sync::ShmMutex;
use vring_shm::vring::config::RingConfig;
use vring_shm::{RingError, RingReader, RingWriter};

const FRAMES: u32 = 200;

/// Wait for `pid` and return its exit code.
fn wait_child(pid: libc::pid_t) -> i32 {
    let mut status = 0;
    let waited = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(waited, pid, "waitpid failed");
    assert!(libc::WIFEXITED(status), "child did not exit normally");
    libc::WEXITSTATUS(status)
}

fn payload(seq: u32) -> Vec<u8> {
    format!("frame-{:05}", seq).into_bytes()
}

/// Child side of `child_reader_sees_every_frame`; returns the exit code.
fn run_child_reader(name: &str, path: &std::path::Path) -> i32 {
    let pid = Pid::this();
    let mut reader = match RingReader::attach_at(name, path, pid) {
        Ok(reader) => reader,
        Err(_) => return 2,
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut next = 0;
    while next < FRAMES {
        if Instant::now() > deadline {
            return 3;
        }
        match reader.wait(1, Duration::from_millis(200)) {
            Ok(()) | Err(RingError::TimedOut) => {}
            Err(_) => return 4,
        }
        let frames = match reader.read_frames(8) {
            Ok(frames) => frames,
            Err(_) => return 5,
        };
        for frame in frames {
            let expected = payload(next);
            if frame[..expected.len()] != expected[..] {
                return 1;
            }
            next += 1;
        }
    }
    drop(reader);
    0
}

#[test]
fn child_reader_sees_every_frame() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vring_xproc");
    let mut writer = RingWriter::create_at("xproc", &path, &RingConfig::new(32, 8)).unwrap();

    // Safety: fork() is unsafe but this is a controlled test environment.
    let pid = unsafe { libc::fork() };
    if pid == 0 {
        // ── CHILD PROCESS (reader) ──
        let code = run_child_reader("xproc", &path);
        std::mem::forget(writer);
        std::process::exit(code);
    }

    // ── PARENT PROCESS (writer) ──
    assert!(pid > 0, "fork failed");
    let start = Instant::now();
    while writer.ring().reader_count() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5), "child never registered");
        std::thread::sleep(Duration::from_millis(1));
    }

    let mut seq = 0;
    while seq < FRAMES {
        writer.wait_space(2, Duration::from_secs(5)).unwrap();
        let frame = payload(seq);
        seq += writer.write_frames(&[frame.as_slice()]).unwrap() as u32;
    }

    assert_eq!(wait_child(pid), 0);
    assert_eq!(writer.ring().reader_count(), 0, "child deregistered on exit");
}

#[test]
fn reader_killed_without_deregistering_is_purged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vring_crash");
    let mut config = RingConfig::new(16, 4);
    config.reader_timeout_ms = 50;
    let mut writer = RingWriter::create_at("crash", &path, &config).unwrap();

    let pid = unsafe { libc::fork() };
    if pid == 0 {
        // ── CHILD PROCESS (reader that vanishes) ──
        let code = match RingReader::attach_at("crash", &path, Pid::this()) {
            Ok(reader) => {
                std::mem::forget(reader);
                0
            }
            Err(_) => 1,
        };
        std::mem::forget(writer);
        std::process::exit(code);
    }

    assert!(pid > 0, "fork failed");
    assert_eq!(wait_child(pid), 0);
    assert_eq!(writer.ring().reader_count(), 1);

    // The dead reader pins the ring at the headroom limit.
    let frames: [&[u8]; 4] = [b"a", b"b", b"c", b"d"];
    assert_eq!(writer.write_frames(&frames).unwrap(), 3);
    assert_eq!(writer.available().unwrap(), 1);

    std::thread::sleep(Duration::from_millis(100));
    writer.write_frames(&frames).unwrap();

    assert_eq!(writer.ring().reader_count(), 0);
    assert!(writer.ring().reader_offset(Pid::from_raw(pid)).is_none());
}

#[test]
fn lock_held_by_dead_process_is_recovered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mutex");
    let mmap = create_segment_mmap(&path, 4096, &MapConfig::default()).unwrap();
    let mutex = unsafe { &*(mmap.as_ptr() as *const ShmMutex) };
    unsafe { mutex.init(true).unwrap() };

    let pid = unsafe { libc::fork() };
    if pid == 0 {
        // ── CHILD PROCESS (dies holding the lock) ──
        let guard = mutex.lock();
        let code = if guard.is_ok() { 0 } else { 1 };
        std::mem::forget(guard);
        std::process::exit(code);
    }

    assert!(pid > 0, "fork failed");
    assert_eq!(wait_child(pid), 0);

    // Robust mutex: the owner died, the next locker gets it.
    drop(mutex.lock().unwrap());
    drop(mutex.lock().unwrap());
}
