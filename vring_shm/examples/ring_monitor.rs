//! Watches every ring under /dev/shm and reports health alerts.
//!
//! Pass `--cleanup` to remove segments whose writer process is gone.

use std::collections::HashSet;
use std::{thread, time::Duration};
use vring_shm::{AlertSeverity, RingResult, RingSegment, SegmentDiscovery};

fn main() -> RingResult<()> {
    let discovery = SegmentDiscovery::new();

    if std::env::args().any(|arg| arg == "--cleanup") {
        let removed = discovery.cleanup_orphaned_segments()?;
        println!("Removed {} orphaned segment(s)", removed);
        return Ok(());
    }

    println!("Ring monitor - watching /dev/shm");
    let mut known = HashSet::new();

    loop {
        let segments = discovery.list_segments()?;
        let current: HashSet<String> = segments.iter().map(|info| info.name.clone()).collect();

        for name in current.difference(&known) {
            println!(">>> ring appeared: [{}]", name);
        }
        for name in known.difference(&current) {
            println!("<<< ring gone: [{}]", name);
        }

        for info in &segments {
            // The segment may vanish between listing and attaching.
            let Ok(segment) = RingSegment::attach(&info.name) else {
                continue;
            };
            let status = segment.ring().status()?;
            println!(
                "[{}] fill {}/{} ({:.0}%), {} reader(s), writer {} {}",
                info.name,
                status.fill_level,
                status.slot_count,
                status.utilization() * 100.0,
                status.readers.len(),
                info.writer_pid,
                if info.writer_alive { "alive" } else { "dead" },
            );
            for alert in status.alerts() {
                let tag = match alert.severity {
                    AlertSeverity::Info => "info",
                    AlertSeverity::Warning => "WARN",
                    AlertSeverity::Error => "ERROR",
                };
                println!("    {}: {}", tag, alert.message);
            }
        }

        known = current;
        thread::sleep(Duration::from_secs(1));
    }
}
