//! Operating-system specific helpers for mapping segments and tracking peers

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::{MapConfig, attach_segment_mmap, create_segment_mmap, current_pid, is_process_alive};
