//! Consumer example: attaches to a ring and prints what it receives.
//!
//! ```text
//! cargo run --example frame_reader -- [ring-name]
//! ```

use std::time::{Duration, Instant};
use tracing::info;
use vring_shm::vring::prelude::{DEFAULT_READER_TIMEOUT, LogLevel};
use vring_shm::{RingError, RingReader, RingResult, init_tracing};

fn main() -> RingResult<()> {
    init_tracing(LogLevel::Info);
    let name = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());

    let mut reader = RingReader::attach(&name)?;
    info!("Attached to '{}' as reader {}", name, reader.pid());

    let mut last_frame = Instant::now();
    loop {
        match reader.wait(1, DEFAULT_READER_TIMEOUT / 2) {
            Ok(()) => last_frame = Instant::now(),
            Err(RingError::TimedOut) => {
                if last_frame.elapsed() > Duration::from_secs(5) {
                    info!("Writer silent for 5 s, detaching");
                    break;
                }
                continue;
            }
            Err(e) => return Err(e),
        }

        let frames = reader.read_frames(16)?;
        if frames.is_empty() {
            // Parked at the end of the ring until the slowest reader wraps.
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        for frame in frames {
            let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
            println!("{}", String::from_utf8_lossy(&frame[..end]));
        }
    }

    info!("Consumed {} slots", reader.slots_read());
    Ok(())
}
