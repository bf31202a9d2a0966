//! Producer example: streams numbered frames into a ring.
//!
//! ```text
//! cargo run --example frame_writer -- [ring-name] [config.toml]
//! ```
//!
//! Without a config file the ring uses 1500-byte slots, 64 of them.

use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use vring_shm::vring::prelude::{ConfigLoader, RingConfig, RingConfigFile};
use vring_shm::{RingError, RingResult, RingWriter, init_tracing};

const FRAMES: u64 = 10_000;

fn main() -> RingResult<()> {
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "demo".to_string());
    let config = match args.next() {
        Some(path) => RingConfigFile::load(Path::new(&path))?.ring,
        None => RingConfig::new(1500, 64),
    };
    config.validate()?;
    init_tracing(config.log_level);

    let mut writer = RingWriter::create(&name, &config)?;
    info!(
        "Ring '{}' ready: {} slots of {} bytes",
        name, config.slot_count, config.slot_size
    );

    let start = Instant::now();
    let mut seq = 0u64;
    while seq < FRAMES {
        match writer.wait_space(2, Duration::from_millis(500)) {
            Ok(()) => {}
            Err(RingError::TimedOut) => {
                warn!("No space after 500 ms, readers are lagging");
                continue;
            }
            Err(e) => return Err(e),
        }

        let frame = format!("frame {:08} at {:?}", seq, start.elapsed());
        seq += writer.write_frames(&[frame.as_bytes()])? as u64;
        // Pace like a 1 kHz source.
        std::thread::sleep(Duration::from_millis(1));
    }

    info!(
        "Wrote {} frames in {:?}; final status:\n{}",
        writer.slots_written(),
        start.elapsed(),
        writer.status()?.to_json().unwrap_or_else(|e| e.to_string())
    );
    Ok(())
}
