//! Linux-specific shared memory operations

use crate::error::RingResult;
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{Pid, getpid};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// How a new segment is mapped
#[derive(Debug, Clone, Copy)]
pub struct MapConfig {
    /// Pre-fault every page at map time (`MAP_POPULATE`)
    pub populate: bool,
    /// Ask for transparent huge pages on the mapping
    pub huge_pages: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            populate: true,
            huge_pages: false,
        }
    }
}

/// Create a new segment file of `size` bytes and map it read-write.
///
/// Fails with `AlreadyExists` (as an IO error) if the file is present.
pub fn create_segment_mmap(path: &Path, size: u64, config: &MapConfig) -> RingResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;

    file.set_len(size)?;

    let mut options = MmapOptions::new();
    if config.populate {
        options.populate();
    }
    let mmap = unsafe { options.map_mut(&file)? };

    if config.huge_pages {
        advise_huge_pages(&mmap);
    }
    Ok(mmap)
}

/// Map an existing segment file read-write.
pub fn attach_segment_mmap(path: &Path) -> RingResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

fn advise_huge_pages(mmap: &MmapMut) {
    let result = unsafe {
        libc::madvise(
            mmap.as_ptr() as *mut libc::c_void,
            mmap.len(),
            libc::MADV_HUGEPAGE,
        )
    };
    if result != 0 {
        tracing::debug!(
            "MADV_HUGEPAGE not applied: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true, // Exists, but we may not signal it
        Err(_) => false,
    }
}

/// Current process id
pub fn current_pid() -> Pid {
    getpid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_is_exclusive_and_attach_sees_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segment");

        let mut created = create_segment_mmap(&path, 4096, &MapConfig::default()).unwrap();
        assert_eq!(created.len(), 4096);
        created[10] = 0xAB;

        let err = create_segment_mmap(&path, 4096, &MapConfig::default()).unwrap_err();
        assert!(err.to_string().contains("exists"));

        let attached = attach_segment_mmap(&path).unwrap();
        assert_eq!(attached[10], 0xAB);
    }

    #[test]
    fn own_process_is_alive() {
        assert!(is_process_alive(current_pid()));
        assert_eq!(current_pid().as_raw() as u32, std::process::id());
    }
}
