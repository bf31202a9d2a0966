//! Status snapshots and health alerts for a ring

use serde::{Deserialize, Serialize};

/// One registered reader as seen by [`ShmRingBuffer::status`](crate::ShmRingBuffer::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStatus {
    /// Reader process id
    pub pid: i32,
    /// Reader's own cursor
    pub offset: u32,
    /// Unread slots for this reader
    pub level: u32,
    /// Grant of the open read transaction, 0 if none
    pub allowed_to_read: u32,
    /// Nanoseconds since the reader's last sign of life
    pub idle_ns: u64,
}

/// Point-in-time view of a ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStatus {
    /// Payload bytes per slot
    pub slot_size: u32,
    /// Number of slots
    pub slot_count: u32,
    /// Slowest reader's cursor
    pub read_offset: u32,
    /// Writer cursor
    pub write_offset: u32,
    /// Occupied slots relative to the slowest reader
    pub fill_level: u32,
    /// True while a write transaction is open
    pub write_in_progress: bool,
    /// Grant of the open write transaction
    pub allowed_to_write: u32,
    /// Nanoseconds since the writer's last begin/end
    pub writer_idle_ns: u64,
    /// Liveness threshold applied to readers
    pub reader_timeout_ns: u64,
    /// Reader table capacity
    pub max_readers: usize,
    /// Registered readers
    pub readers: Vec<ReaderStatus>,
}

/// Conditions worth surfacing to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    /// Reader silent for longer than the liveness threshold; it will be
    /// purged on the next commit
    StaleReader {
        /// Reader process id
        pid: i32,
    },
    /// No slot can be granted to the writer
    RingFull,
    /// Every reader slot is taken
    ReaderTableFull,
    /// Writer silent for longer than the liveness threshold
    WriterIdle,
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    /// Information only
    Info,
    /// Warning - attention needed
    Warning,
    /// Error - action required
    Error,
}

/// A single health finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// What was detected
    pub alert_type: AlertType,
    /// How bad it is
    pub severity: AlertSeverity,
    /// Human-readable description
    pub message: String,
}

impl RingStatus {
    /// Slots the writer could still be granted, keeping one slot of headroom.
    pub fn free_slots(&self) -> u32 {
        self.slot_count
            .saturating_sub(1)
            .saturating_sub(self.fill_level)
    }

    /// Fill level as a fraction of capacity.
    pub fn utilization(&self) -> f64 {
        if self.slot_count == 0 {
            0.0
        } else {
            f64::from(self.fill_level) / f64::from(self.slot_count)
        }
    }

    /// Findings derived from this snapshot, most severe first.
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for reader in &self.readers {
            if reader.idle_ns > self.reader_timeout_ns {
                alerts.push(Alert {
                    alert_type: AlertType::StaleReader { pid: reader.pid },
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "Reader {} idle for {} ms",
                        reader.pid,
                        reader.idle_ns / 1_000_000
                    ),
                });
            }
        }

        if !self.readers.is_empty() && self.free_slots() == 0 {
            let slowest = self
                .readers
                .iter()
                .filter(|r| r.offset == self.read_offset)
                .map(|r| r.pid.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            alerts.push(Alert {
                alert_type: AlertType::RingFull,
                severity: AlertSeverity::Error,
                message: format!("Ring full, held back by reader(s) {}", slowest),
            });
        }

        if self.readers.len() >= self.max_readers {
            alerts.push(Alert {
                alert_type: AlertType::ReaderTableFull,
                severity: AlertSeverity::Warning,
                message: format!("All {} reader slots in use", self.max_readers),
            });
        }

        if self.writer_idle_ns > self.reader_timeout_ns {
            alerts.push(Alert {
                alert_type: AlertType::WriterIdle,
                severity: AlertSeverity::Info,
                message: format!("Writer idle for {} ms", self.writer_idle_ns / 1_000_000),
            });
        }

        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        alerts
    }

    /// Pretty-printed JSON rendering of the snapshot.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> RingStatus {
        RingStatus {
            slot_size: 64,
            slot_count: 4,
            read_offset: 1,
            write_offset: 3,
            fill_level: 2,
            write_in_progress: false,
            allowed_to_write: 0,
            writer_idle_ns: 1_000,
            reader_timeout_ns: 2_000_000_000,
            max_readers: 8,
            readers: vec![ReaderStatus {
                pid: 42,
                offset: 1,
                level: 2,
                allowed_to_read: 0,
                idle_ns: 500,
            }],
        }
    }

    #[test]
    fn healthy_ring_has_no_alerts() {
        let status = status();
        assert_eq!(status.free_slots(), 1);
        assert!((status.utilization() - 0.5).abs() < f64::EPSILON);
        assert!(status.alerts().is_empty());
    }

    #[test]
    fn full_ring_names_slowest_reader() {
        let mut status = status();
        status.fill_level = 3;
        status.readers[0].idle_ns = 3_000_000_000;

        let alerts = status.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alert_type, AlertType::RingFull);
        assert!(alerts[0].message.contains("42"));
        assert_eq!(alerts[1].alert_type, AlertType::StaleReader { pid: 42 });
    }

    #[test]
    fn json_round_trip_keeps_readers() {
        let status = status();
        let json = status.to_json().unwrap();
        assert!(json.contains("\"fill_level\": 2"));
        let parsed: RingStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn severity_ordering() {
        assert!(AlertSeverity::Error > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }
}
