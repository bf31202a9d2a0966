//! Protocol-level scenarios against a heap-allocated ring core.

use nix::unistd::Pid;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use vring_shm::vring::consts::MAX_READERS;
use vring_shm::{Access, DataRegion, Grant, RingError, ShmRingBuffer};

const WRITER: Pid = Pid::from_raw(1);

fn new_ring(slot_count: u32) -> Box<ShmRingBuffer> {
    let ring = ShmRingBuffer::new_boxed();
    ring.init(64, slot_count, DataRegion::new(0, 64 * u64::from(slot_count)), false)
        .unwrap();
    ring
}

fn commit(ring: &ShmRingBuffer, n: u32) -> Grant {
    let grant = ring.begin_access(Access::Write, WRITER, n).unwrap();
    ring.end_access(Access::Write, WRITER, grant.offset, grant.num_slots)
        .unwrap();
    grant
}

fn consume(ring: &ShmRingBuffer, pid: Pid, n: u32) -> Grant {
    let grant = ring.begin_access(Access::Read, pid, n).unwrap();
    ring.end_access(Access::Read, pid, grant.offset, grant.num_slots)
        .unwrap();
    grant
}

#[test]
fn reader_table_overflow_then_reuse_after_removal() {
    let ring = new_ring(16);
    for i in 0..MAX_READERS as i32 {
        ring.add_reader(Pid::from_raw(200 + i)).unwrap();
    }
    let extra = Pid::from_raw(300);
    assert!(matches!(
        ring.add_reader(extra),
        Err(RingError::TooManyReaders { .. })
    ));

    ring.remove_reader(Pid::from_raw(203)).unwrap();
    ring.add_reader(extra).unwrap();
    assert_eq!(ring.reader_count(), MAX_READERS);
}

#[test]
fn write_n_then_read_n_restores_fill_level() {
    let ring = new_ring(10);
    let reader = Pid::from_raw(400);
    ring.add_reader(reader).unwrap();

    for round in 0..25 {
        let before = ring.fill_level();
        let written = commit(&ring, 1 + round % 4).num_slots;
        let mut remaining = written + before;
        while remaining > 0 {
            let got = consume(&ring, reader, remaining).num_slots;
            assert!(got > 0, "reader stalled in round {}", round);
            remaining -= got;
        }
        assert_eq!(ring.fill_level(), 0, "round {}", round);
    }
}

#[test]
fn grants_never_cross_the_arena_end() {
    let ring = new_ring(7);
    let reader = Pid::from_raw(401);
    ring.add_reader(reader).unwrap();

    for step in 0..200u32 {
        let w = commit(&ring, 1 + step % 5);
        assert!(w.offset + w.num_slots <= 7);
        let r = consume(&ring, reader, 1 + (step * 3) % 6);
        assert!(r.offset + r.num_slots <= 7);
    }
}

#[test]
fn fast_reader_never_sees_more_than_the_writer() {
    let ring = new_ring(12);
    let fast = Pid::from_raw(500);
    let slow = Pid::from_raw(501);
    ring.add_reader(fast).unwrap();
    ring.add_reader(slow).unwrap();

    for _ in 0..30 {
        commit(&ring, 3);
        consume(&ring, fast, 3);
        consume(&ring, slow, 1);

        let fast_level = ring.update_available(Access::Read, fast).unwrap();
        let slow_level = ring.update_available(Access::Read, slow).unwrap();
        assert!(fast_level <= ring.fill_level());
        assert_eq!(slow_level, ring.fill_level());
        assert_eq!(ring.reader_offset(slow), Some(ring.read_offset()));
    }
}

#[test]
fn dead_reader_is_purged_and_stops_gating_the_writer() {
    let ring = new_ring(4);
    let dead = Pid::from_raw(600);
    let alive = Pid::from_raw(601);
    ring.add_reader(dead).unwrap();
    ring.add_reader(alive).unwrap();
    ring.set_reader_timeout(Duration::from_millis(30)).unwrap();

    commit(&ring, 3);
    consume(&ring, alive, 3);
    assert_eq!(ring.update_available(Access::Write, WRITER).unwrap(), 1);

    thread::sleep(Duration::from_millis(60));
    consume(&ring, alive, 1);
    // Nothing fits, but closing the transaction still runs the purge.
    assert!(commit(&ring, 1).is_empty());

    assert_eq!(ring.reader_offset(dead), None);
    assert!(matches!(
        ring.update_available(Access::Read, dead),
        Err(RingError::InvalidParameter { .. })
    ));
    assert_eq!(ring.fill_level(), 0);
    assert_eq!(commit(&ring, 1).num_slots, 1);
    assert_eq!(ring.fill_level(), 1);
}

#[test]
fn wait_write_times_out_close_to_requested_window() {
    let ring = new_ring(4);
    ring.add_reader(Pid::from_raw(700)).unwrap();
    commit(&ring, 3);

    let start = Instant::now();
    let err = ring.wait_write(4, Duration::from_millis(100)).unwrap_err();
    let elapsed = start.elapsed();
    assert!(matches!(err, RingError::TimedOut));
    assert!(elapsed >= Duration::from_millis(100), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "returned late: {:?}", elapsed);
}

#[test]
fn waiting_reader_fails_after_being_removed() {
    let ring = Arc::new(new_ring(4));
    let reader = Pid::from_raw(800);
    ring.add_reader(reader).unwrap();

    let waiter = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || ring.wait_read(reader, 1, Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(30));
    ring.remove_reader(reader).unwrap();
    // Removal alone does not wake readers; a commit does.
    commit(&ring, 1);

    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(RingError::InvalidParameter { .. })));
}

#[test]
fn streaming_between_threads_preserves_order() {
    const TOTAL: u32 = 2_000;
    let ring = Arc::new(new_ring(8));
    let readers = [Pid::from_raw(900), Pid::from_raw(901)];
    for pid in readers {
        ring.add_reader(pid).unwrap();
    }
    // Sequence number of the payload currently held by each slot.
    let slots: Arc<Vec<std::sync::atomic::AtomicU32>> =
        Arc::new((0..8).map(|_| std::sync::atomic::AtomicU32::new(0)).collect());
    let failed = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = readers
        .into_iter()
        .map(|pid| {
            let ring = Arc::clone(&ring);
            let slots = Arc::clone(&slots);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                let mut expected = 0u32;
                while expected < TOTAL && !failed.load(Ordering::Relaxed) {
                    match ring.wait_read(pid, 1, Duration::from_millis(200)) {
                        Ok(()) | Err(RingError::TimedOut) => {}
                        Err(e) => panic!("reader {} failed: {}", pid, e),
                    }
                    let grant = ring.begin_access(Access::Read, pid, 3).unwrap();
                    for slot in grant.offset..grant.offset + grant.num_slots {
                        let seq = slots[slot as usize].load(Ordering::Acquire);
                        if seq != expected {
                            failed.store(true, Ordering::Relaxed);
                        }
                        expected += 1;
                    }
                    ring.end_access(Access::Read, pid, grant.offset, grant.num_slots)
                        .unwrap();
                }
                expected
            })
        })
        .collect();

    let mut seq = 0u32;
    while seq < TOTAL {
        match ring.wait_write(2, Duration::from_secs(2)) {
            Ok(()) => {}
            Err(e) => panic!("writer wait failed: {}", e),
        }
        let grant = ring.begin_access(Access::Write, WRITER, (TOTAL - seq).min(4)).unwrap();
        for slot in grant.offset..grant.offset + grant.num_slots {
            slots[slot as usize].store(seq, Ordering::Release);
            seq += 1;
        }
        ring.end_access(Access::Write, WRITER, grant.offset, grant.num_slots)
            .unwrap();
    }

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), TOTAL);
    }
    assert!(!failed.load(Ordering::Relaxed));
}
