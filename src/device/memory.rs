//! Buffer-backed device.
//!
//! `MemoryDisk` models one physical disk (number 0) as a byte vector plus a
//! drive layout buffer, with per-operation fault injection and counters that
//! let callers verify locking, unlocking, handle release and layout commits
//! without touching hardware. Clones share the same underlying disk.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{PartMoveError, Result};
use crate::layout::DriveLayout;

use super::{DeviceChannel, DeviceOpener};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    OpenDisk,
    OpenVolume,
    Lock,
    Dismount,
    Unlock,
    Read,
    Write,
    GetLayout,
    SetLayout,
}

#[derive(Debug, Default)]
struct DiskState {
    data: Vec<u8>,
    layout: Vec<u8>,
    // remaining successful calls before the fault fires
    faults: HashMap<FaultPoint, usize>,
    open_handles: usize,
    locked: HashSet<String>,
    dismounted: HashSet<String>,
    unlock_calls: usize,
    layout_commits: usize,
    writes: usize,
}

impl DiskState {
    fn check(&mut self, point: FaultPoint, op: &str) -> Result<()> {
        match self.faults.get_mut(&point) {
            Some(0) => {
                let message = "injected fault".to_string();
                match point {
                    FaultPoint::OpenDisk
                    | FaultPoint::OpenVolume
                    | FaultPoint::Lock
                    | FaultPoint::Dismount
                    | FaultPoint::Unlock => Err(PartMoveError::Access {
                        op: op.to_string(),
                        code: None,
                        message,
                    }),
                    _ => Err(PartMoveError::Io {
                        op: op.to_string(),
                        code: None,
                        message,
                    }),
                }
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn checked_range(offset: u64, len: u64, disk_len: usize) -> Range<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= disk_len as u64 => offset as usize..end as usize,
        _ => panic!("range {offset}+{len} is outside the {disk_len}-byte memory disk"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    state: Arc<Mutex<DiskState>>,
}

impl MemoryDisk {
    pub fn new(size: usize, layout: DriveLayout) -> Self {
        let state = DiskState {
            data: vec![0u8; size],
            layout: layout.into_bytes(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, DiskState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every call to `point` fail.
    pub fn fail(&self, point: FaultPoint) {
        self.fail_after(point, 0);
    }

    /// Let `successes` calls to `point` succeed, then fail the rest.
    pub fn fail_after(&self, point: FaultPoint, successes: usize) {
        self.state().faults.insert(point, successes);
    }

    /// Seed disk contents directly, bypassing channels and fault injection.
    ///
    /// # Panics
    ///
    /// Panics if `offset + bytes.len()` is past the end of the disk.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) {
        let mut st = self.state();
        let range = checked_range(offset, bytes.len() as u64, st.data.len());
        st.data[range].copy_from_slice(bytes);
    }

    /// Copy of the disk contents in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is reversed or extends past the end of the disk.
    pub fn bytes(&self, range: Range<u64>) -> Vec<u8> {
        let st = self.state();
        let len = range.end.checked_sub(range.start).unwrap_or_else(|| {
            panic!("reversed range {}..{}", range.start, range.end)
        });
        st.data[checked_range(range.start, len, st.data.len())].to_vec()
    }

    /// Currently committed layout.
    pub fn layout(&self) -> DriveLayout {
        DriveLayout::from_bytes(self.state().layout.clone())
    }

    /// Replace the committed layout, e.g. to simulate an external change.
    pub fn replace_layout(&self, layout: DriveLayout) {
        self.state().layout = layout.into_bytes();
    }

    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    pub fn is_locked(&self, volume: &str) -> bool {
        self.state().locked.contains(volume)
    }

    pub fn was_dismounted(&self, volume: &str) -> bool {
        self.state().dismounted.contains(volume)
    }

    pub fn unlock_calls(&self) -> usize {
        self.state().unlock_calls
    }

    pub fn layout_commits(&self) -> usize {
        self.state().layout_commits
    }

    /// Number of successful chunk writes.
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    fn channel(&self, target: Target) -> MemoryChannel {
        self.state().open_handles += 1;
        MemoryChannel {
            state: Arc::clone(&self.state),
            target,
            position: 0,
        }
    }
}

impl DeviceOpener for MemoryDisk {
    type Channel = MemoryChannel;

    fn open_disk(&self, number: u32, writable: bool) -> Result<MemoryChannel> {
        self.state().check(FaultPoint::OpenDisk, "open disk")?;
        if number != 0 {
            return Err(PartMoveError::Access {
                op: format!("open disk {number}"),
                code: None,
                message: "no such disk".into(),
            });
        }
        Ok(self.channel(Target::Disk { writable }))
    }

    fn open_volume(&self, id: &str) -> Result<MemoryChannel> {
        self.state().check(FaultPoint::OpenVolume, "open volume")?;
        Ok(self.channel(Target::Volume(id.to_string())))
    }
}

#[derive(Debug)]
enum Target {
    Disk { writable: bool },
    Volume(String),
}

/// Channel on a `MemoryDisk`; releases its handle count on drop.
#[derive(Debug)]
pub struct MemoryChannel {
    state: Arc<Mutex<DiskState>>,
    target: Target,
    position: u64,
}

impl MemoryChannel {
    fn state(&self) -> MutexGuard<'_, DiskState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn volume(&self, op: &str) -> Result<String> {
        match &self.target {
            Target::Volume(id) => Ok(id.clone()),
            Target::Disk { .. } => Err(PartMoveError::Io {
                op: op.to_string(),
                code: None,
                message: "not a volume handle".into(),
            }),
        }
    }

    fn disk(&self, op: &str) -> Result<bool> {
        match &self.target {
            Target::Disk { writable } => Ok(*writable),
            Target::Volume(_) => Err(PartMoveError::Io {
                op: op.to_string(),
                code: None,
                message: "not a disk handle".into(),
            }),
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        let mut st = self.state();
        st.open_handles = st.open_handles.saturating_sub(1);
    }
}

impl DeviceChannel for MemoryChannel {
    fn lock(&mut self) -> Result<()> {
        let id = self.volume("lock volume")?;
        let mut st = self.state();
        st.check(FaultPoint::Lock, "lock volume")?;
        st.locked.insert(id);
        Ok(())
    }

    fn dismount(&mut self) -> Result<()> {
        let id = self.volume("dismount volume")?;
        let mut st = self.state();
        st.check(FaultPoint::Dismount, "dismount volume")?;
        st.dismounted.insert(id);
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        let id = self.volume("unlock volume")?;
        let mut st = self.state();
        st.unlock_calls += 1;
        st.check(FaultPoint::Unlock, "unlock volume")?;
        st.locked.remove(&id);
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.position = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.disk("read")?;
        let position = self.position;
        let mut st = self.state();
        st.check(FaultPoint::Read, "read")?;
        let start = position as usize;
        let available = st.data.len().saturating_sub(start).min(buf.len());
        if available < buf.len() {
            return Err(PartMoveError::short_transfer("read", buf.len(), available));
        }
        buf.copy_from_slice(&st.data[start..start + buf.len()]);
        drop(st);
        self.position += buf.len() as u64;
        Ok(())
    }

    fn write_exact(&mut self, buf: &[u8]) -> Result<()> {
        if !self.disk("write")? {
            return Err(PartMoveError::Access {
                op: "write".into(),
                code: None,
                message: "disk opened read-only".into(),
            });
        }
        let position = self.position;
        let mut st = self.state();
        st.check(FaultPoint::Write, "write")?;
        let start = position as usize;
        let available = st.data.len().saturating_sub(start).min(buf.len());
        if available < buf.len() {
            return Err(PartMoveError::short_transfer("write", buf.len(), available));
        }
        st.data[start..start + buf.len()].copy_from_slice(buf);
        st.writes += 1;
        drop(st);
        self.position += buf.len() as u64;
        Ok(())
    }

    fn get_layout(&mut self) -> Result<DriveLayout> {
        self.disk("get drive layout")?;
        let mut st = self.state();
        st.check(FaultPoint::GetLayout, "get drive layout")?;
        Ok(DriveLayout::from_bytes(st.layout.clone()))
    }

    fn set_layout(&mut self, layout: &DriveLayout) -> Result<()> {
        self.disk("set drive layout")?;
        let mut st = self.state();
        st.check(FaultPoint::SetLayout, "set drive layout")?;
        st.layout = layout.as_bytes().to_vec();
        st.layout_commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PartitionStyle;

    fn disk() -> MemoryDisk {
        MemoryDisk::new(64, DriveLayout::from_extents(PartitionStyle::Gpt, &[(0, 32)]).unwrap())
    }

    #[test]
    fn seeding_round_trips_inside_bounds() {
        let d = disk();
        d.write_at(60, &[1, 2, 3, 4]);
        assert_eq!(d.bytes(60..64), vec![1, 2, 3, 4]);
        assert_eq!(d.writes(), 0);
    }

    #[test]
    #[should_panic(expected = "outside the 64-byte memory disk")]
    fn seeding_past_the_end_panics() {
        disk().write_at(62, &[0; 4]);
    }

    #[test]
    #[should_panic(expected = "outside the 64-byte memory disk")]
    fn reading_past_the_end_panics() {
        disk().bytes(u64::MAX - 1..u64::MAX);
    }

    #[test]
    fn handles_are_counted_and_released() {
        let d = disk();
        let a = d.open_disk(0, false).unwrap();
        let b = d.open_volume("E:").unwrap();
        assert_eq!(d.open_handles(), 2);
        drop(a);
        drop(b);
        assert_eq!(d.open_handles(), 0);
    }

    #[test]
    fn short_read_past_end_is_io_failure() {
        let d = disk();
        let mut ch = d.open_disk(0, false).unwrap();
        ch.seek(60).unwrap();
        let mut buf = [0u8; 8];
        let err = ch.read_exact(&mut buf).unwrap_err();
        assert!(matches!(err, PartMoveError::Io { .. }));
    }

    #[test]
    fn read_only_disk_rejects_writes() {
        let d = disk();
        let mut ch = d.open_disk(0, false).unwrap();
        let err = ch.write_exact(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PartMoveError::Access { .. }));
        assert_eq!(d.writes(), 0);
    }

    #[test]
    fn fault_fires_after_budget() {
        let d = disk();
        d.fail_after(FaultPoint::Write, 1);
        let mut ch = d.open_disk(0, true).unwrap();
        ch.write_exact(&[1]).unwrap();
        assert!(ch.write_exact(&[2]).is_err());
        assert_eq!(d.bytes(0..2), vec![1, 0]);
    }
}
