//! Raw device access.
//!
//! A channel exclusively owns one OS handle (disk or volume) and releases it
//! on drop, so every exit path of a move (success, error, cancellation)
//! closes its handles. The platform backends live in `crate::platform`;
//! `memory` provides a buffer-backed device for tests and dry runs.

pub mod memory;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::layout::DriveLayout;

/// Capability set of an open disk or volume handle.
pub trait DeviceChannel {
    /// Lock the volume against filesystem access.
    fn lock(&mut self) -> Result<()>;
    /// Dismount the filesystem on a locked volume.
    fn dismount(&mut self) -> Result<()>;
    fn unlock(&mut self) -> Result<()>;
    /// Position the handle at an absolute byte offset.
    fn seek(&mut self, offset: u64) -> Result<()>;
    /// Fill `buf` from the current position; a short read is an error.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
    /// Write all of `buf` at the current position; a short write is an error.
    fn write_exact(&mut self, buf: &[u8]) -> Result<()>;
    /// Fetch the current drive layout.
    fn get_layout(&mut self) -> Result<DriveLayout>;
    /// Commit a drive layout in a single call.
    fn set_layout(&mut self, layout: &DriveLayout) -> Result<()>;
}

/// Opens channels on a physical device.
pub trait DeviceOpener {
    type Channel: DeviceChannel;

    fn open_disk(&self, number: u32, writable: bool) -> Result<Self::Channel>;
    fn open_volume(&self, id: &str) -> Result<Self::Channel>;
}

/// Volume held locked and dismounted for the lifetime of the guard.
///
/// Dropping the guard attempts `unlock()` and then closes the handle.
/// Unlock failures are logged and swallowed.
pub struct VolumeLock<C: DeviceChannel> {
    channel: C,
    volume: String,
}

impl<C: DeviceChannel> VolumeLock<C> {
    /// Lock then dismount `channel`. On failure the guard is dropped before
    /// returning, so the unlock attempt and handle release still happen.
    pub fn acquire(channel: C, volume: &str) -> Result<Self> {
        let mut guard = VolumeLock {
            channel,
            volume: volume.to_string(),
        };
        guard.channel.lock()?;
        debug!(volume = %guard.volume, "volume locked");
        guard.channel.dismount()?;
        debug!(volume = %guard.volume, "volume dismounted");
        Ok(guard)
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }
}

impl<C: DeviceChannel> Drop for VolumeLock<C> {
    fn drop(&mut self) {
        match self.channel.unlock() {
            Ok(()) => debug!(volume = %self.volume, "volume unlocked"),
            Err(e) => warn!(volume = %self.volume, error = %e, "unlock failed; ignoring"),
        }
    }
}

/// Device path of physical disk `number`, e.g. `\\.\PhysicalDrive1`.
pub fn disk_device_path(number: u32) -> String {
    format!(r"\\.\PhysicalDrive{number}")
}

/// Device path for a volume identifier.
///
/// Drive letters in any of the forms `C`, `C:`, `C:\` map to `\\.\C:`.
/// Volume GUID paths (`\\?\Volume{...}\`) keep their prefix and lose the
/// trailing separator, which would otherwise open the root directory.
pub fn volume_device_path(id: &str) -> String {
    let trimmed = id.trim().trim_end_matches(['\\', '/']);
    if trimmed.starts_with(r"\\") {
        return trimmed.to_string();
    }
    let letter = trimmed.trim_end_matches(':');
    format!(r"\\.\{letter}:")
}
