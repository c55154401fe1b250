//! Device State Machine
//!
//! Per device id: `Unknown -> Discovered -> {Online, Offline}`.
//! The table keeps exactly one record per id and never forgets a device:
//! a device missing from a poll keeps its last record and status.

use crate::device::{CameraStats, DeviceRecord};
use std::collections::HashMap;

/// Status of a device id as seen by the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Never observed
    Unknown,
    /// Observed once, no status change acted on yet
    Discovered,
    Online,
    Offline,
}

/// Result of applying a fresh record to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTransition {
    /// First observation of this id
    Discovered { online: bool },
    /// Online flag flipped to true
    CameOnline,
    /// Online flag flipped to false
    WentOffline,
    /// Same online flag as the previous record
    Unchanged,
}

impl DeviceTransition {
    /// Whether this transition warrants a one-shot event publication
    pub fn is_status_change(&self) -> bool {
        matches!(self, DeviceTransition::CameOnline | DeviceTransition::WentOffline)
    }
}

#[derive(Debug)]
struct Entry {
    record: DeviceRecord,
    status: DeviceStatus,
}

/// Last-known record per device id
#[derive(Debug, Default)]
pub struct DeviceTable {
    entries: HashMap<String, Entry>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored record for `record.camera_id` wholesale and report
    /// how the device moved.
    pub fn apply(&mut self, record: DeviceRecord) -> DeviceTransition {
        let online = record.online;

        let (transition, status) = match self.entries.get(&record.camera_id) {
            None => (DeviceTransition::Discovered { online }, DeviceStatus::Discovered),
            Some(prev) if prev.record.online != online => {
                if online {
                    (DeviceTransition::CameOnline, DeviceStatus::Online)
                } else {
                    (DeviceTransition::WentOffline, DeviceStatus::Offline)
                }
            }
            Some(prev) => (DeviceTransition::Unchanged, prev.status),
        };

        self.entries
            .insert(record.camera_id.clone(), Entry { record, status });

        transition
    }

    pub fn status(&self, camera_id: &str) -> DeviceStatus {
        self.entries
            .get(camera_id)
            .map(|e| e.status)
            .unwrap_or(DeviceStatus::Unknown)
    }

    pub fn get(&self, camera_id: &str) -> Option<&DeviceRecord> {
        self.entries.get(camera_id).map(|e| &e.record)
    }

    /// All records, sorted by id for stable output
    pub fn records(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> =
            self.entries.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        records
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CameraStats {
        self.entries
            .values()
            .fold(CameraStats::default(), |mut stats, entry| {
                let record = &entry.record;
                stats.total += 1;
                if record.online {
                    stats.online += 1;
                } else {
                    stats.offline += 1;
                }
                stats.total_viewers += record.viewers;
                stats.total_bytes_received += record.bytes_received;
                stats
            })
    }
}
