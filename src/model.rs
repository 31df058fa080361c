//! Descriptor snapshots supplied by the caller and the values the core hands back.
//!
//! Disk and partition descriptors come from an external enumeration service;
//! the core never queries the system for them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of a physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDescriptor {
    pub number: u32,
    pub size_bytes: u64,
}

/// Snapshot of one partition on a disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub disk_index: u32,
    pub partition_index: u32,
    pub starting_offset: u64,
    pub size_bytes: u64,
    /// Type label as reported by the enumeration service (e.g. "NTFS", "Basic").
    pub kind: String,
    pub bootable: bool,
    pub active: bool,
    /// Volume identifier (drive letter or volume GUID path), if the partition has one.
    pub volume: Option<String>,
}

impl PartitionDescriptor {
    /// Minimal descriptor for an extent; remaining fields take neutral values.
    pub fn extent(starting_offset: u64, size_bytes: u64) -> Self {
        Self {
            disk_index: 0,
            partition_index: 0,
            starting_offset,
            size_bytes,
            kind: String::new(),
            bootable: false,
            active: false,
            volume: None,
        }
    }

    pub fn end(&self) -> u64 {
        self.starting_offset.saturating_add(self.size_bytes)
    }
}

/// Unallocated byte range on a disk; `size` is always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpaceRegion {
    pub start: u64,
    pub size: u64,
}

impl FreeSpaceRegion {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

impl fmt::Display for FreeSpaceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} free at {}", format_bytes(self.size), format_bytes(self.start))
    }
}

/// Copy progress snapshot; `bytes_copied <= total_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveProgress {
    pub bytes_copied: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
}

impl MoveProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.bytes_copied as f64 * 100.0 / self.total_bytes as f64
        }
    }
}

impl fmt::Display for MoveProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}  ({}/s)",
            format_bytes(self.bytes_copied),
            format_bytes(self.total_bytes),
            format_bytes(self.bytes_per_second as u64)
        )
    }
}

/// Human-readable binary size, e.g. "1.5 GiB".
pub fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;
    let f = n as f64;
    if f >= TB {
        format!("{:.1} TiB", f / TB)
    } else if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{} B", n)
    }
}
