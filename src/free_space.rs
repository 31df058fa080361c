//! Free-space computation used to offer move destinations.
//! Pure function over caller-supplied snapshots; performs no I/O.

use crate::model::{DiskDescriptor, FreeSpaceRegion, PartitionDescriptor};

/// Contiguous unallocated regions of at least `min_size` bytes, in ascending
/// offset order.
///
/// Zero-sized partitions are ignored. Overlapping or nested partitions never
/// move the cursor backwards, so every region is disjoint from every input
/// partition. Gaps are clipped to the end of the disk.
pub fn compute(
    disk: &DiskDescriptor,
    partitions: &[PartitionDescriptor],
    min_size: u64,
) -> Vec<FreeSpaceRegion> {
    if disk.size_bytes == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&PartitionDescriptor> =
        partitions.iter().filter(|p| p.size_bytes > 0).collect();
    sorted.sort_by_key(|p| p.starting_offset);

    let mut regions = Vec::new();
    let mut cursor = 0u64;
    for p in sorted {
        push_if_large_enough(&mut regions, cursor, p.starting_offset.min(disk.size_bytes), min_size);
        cursor = cursor.max(p.end());
    }
    push_if_large_enough(&mut regions, cursor, disk.size_bytes, min_size);

    regions
}

fn push_if_large_enough(regions: &mut Vec<FreeSpaceRegion>, start: u64, end: u64, min_size: u64) {
    if end <= start {
        return;
    }
    let size = end - start;
    if size >= min_size {
        regions.push(FreeSpaceRegion { start, size });
    }
}
