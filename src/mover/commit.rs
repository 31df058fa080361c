//! Partition table commit: point the moved entry at its new offset.

use tracing::info;

use crate::device::DeviceChannel;
use crate::errors::{PartMoveError, Result};

/// Fetch a fresh layout, rewrite the entry starting at `old_offset` to
/// `new_offset`, flag it for rewrite and commit the buffer in one call.
///
/// Fails with `LayoutMismatch` when no entry starts at `old_offset`.
pub(super) fn commit_new_offset<C: DeviceChannel>(disk: &mut C, old_offset: u64, new_offset: u64) -> Result<()> {
    let mut layout = disk.get_layout()?;
    let index = layout
        .find_by_start_offset(old_offset)?
        .ok_or(PartMoveError::LayoutMismatch { offset: old_offset })?;

    let value = i64::try_from(new_offset).map_err(|_| {
        PartMoveError::InvalidRequest(format!("offset {new_offset} does not fit the drive layout"))
    })?;
    layout.write_start_offset(index, value)?;
    layout.mark_dirty(index)?;
    disk.set_layout(&layout)?;

    info!(
        entry = index,
        partition = layout.read_partition_number(index).ok(),
        old_offset,
        new_offset,
        "partition table entry rewritten"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceOpener;
    use crate::device::memory::MemoryDisk;
    use crate::layout::{DriveLayout, PartitionStyle};

    #[test]
    fn only_matching_entry_changes() {
        let before = DriveLayout::from_extents(PartitionStyle::Gpt, &[(1024, 512), (4096, 512)]).unwrap();
        let disk = MemoryDisk::new(8192, before.clone());
        let mut ch = disk.open_disk(0, true).unwrap();
        commit_new_offset(&mut ch, 4096, 2048).unwrap();

        let after = disk.layout();
        assert_eq!(after.read_start_offset(1).unwrap(), 2048);
        assert!(after.is_dirty(1).unwrap());
        assert!(!after.is_dirty(0).unwrap());
        assert_eq!(after.as_bytes()[..48 + 144], before.as_bytes()[..48 + 144]);
    }

    #[test]
    fn missing_entry_is_layout_mismatch() {
        let disk = MemoryDisk::new(8192, DriveLayout::from_extents(PartitionStyle::Gpt, &[(1024, 512)]).unwrap());
        let mut ch = disk.open_disk(0, true).unwrap();
        let err = commit_new_offset(&mut ch, 4096, 2048).unwrap_err();
        assert!(matches!(err, PartMoveError::LayoutMismatch { offset: 4096 }));
        assert_eq!(disk.layout_commits(), 0);
    }
}
