//! Segment discovery and orphan cleanup

use crate::error::RingResult;
use crate::platform::is_process_alive;
use crate::segment::RingSegment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vring::consts::SHM_PATH_PREFIX;

/// Segment metadata information
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Ring name
    pub name: String,
    /// Backing file
    pub path: PathBuf,
    /// Mapped size in bytes
    pub size: usize,
    /// Payload bytes per slot
    pub slot_size: u32,
    /// Number of slots
    pub slot_count: u32,
    /// Creating process ID
    pub writer_pid: i32,
    /// Whether the creating process still runs
    pub writer_alive: bool,
    /// Registered readers
    pub reader_count: usize,
    /// Current fill level
    pub fill_level: u32,
}

/// Scans a directory for ring segment files.
#[derive(Debug, Clone)]
pub struct SegmentDiscovery {
    dir: PathBuf,
    file_prefix: String,
}

impl Default for SegmentDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentDiscovery {
    /// Discovery over `/dev/shm`.
    pub fn new() -> Self {
        let prefix = Path::new(SHM_PATH_PREFIX);
        let dir = prefix.parent().unwrap_or(Path::new("/dev/shm"));
        Self::in_dir(dir)
    }

    /// Discovery over an arbitrary directory using the same file naming.
    pub fn in_dir(dir: &Path) -> Self {
        let file_prefix = Path::new(SHM_PATH_PREFIX)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("vring_")
            .to_string();
        Self {
            dir: dir.to_path_buf(),
            file_prefix,
        }
    }

    /// Every valid ring segment in the directory. Files that carry the
    /// prefix but fail validation are skipped.
    pub fn list_segments(&self) -> RingResult<Vec<SegmentInfo>> {
        let mut segments = Vec::new();
        if !self.dir.exists() {
            return Ok(segments);
        }

        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(name) = file_name.strip_prefix(&self.file_prefix) else {
                continue;
            };
            match RingSegment::attach_at(name, &entry.path()) {
                Ok(segment) => segments.push(describe(&segment)),
                Err(e) => debug!("Skipping {}: {}", file_name, e),
            }
        }

        segments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(segments)
    }

    /// Look up one ring by name.
    pub fn find_segment(&self, name: &str) -> RingResult<Option<SegmentInfo>> {
        Ok(self
            .list_segments()?
            .into_iter()
            .find(|segment| segment.name == name))
    }

    /// Remove segments whose writer process is gone. Returns how many were removed.
    pub fn cleanup_orphaned_segments(&self) -> RingResult<usize> {
        let mut cleaned = 0;
        for segment in self.list_segments()? {
            if segment.writer_alive {
                continue;
            }
            if std::fs::remove_file(&segment.path).is_ok() {
                info!(
                    "Removed orphaned segment {} (writer {} gone)",
                    segment.name, segment.writer_pid
                );
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }
}

fn describe(segment: &RingSegment) -> SegmentInfo {
    let ring = segment.ring();
    let writer = segment.writer_pid();
    SegmentInfo {
        name: segment.name().to_string(),
        path: segment.path().to_path_buf(),
        size: segment.size(),
        slot_size: ring.slot_size(),
        slot_count: ring.slot_count(),
        writer_pid: writer.as_raw(),
        writer_alive: is_process_alive(writer),
        reader_count: ring.reader_count(),
        fill_level: ring.fill_level(),
    }
}
