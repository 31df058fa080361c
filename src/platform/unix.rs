//! Non-Windows backend.
//!
//! The drive layout ABI is a Windows interface, so raw partition moves are
//! refused here before any device is touched. Free-space analysis and the
//! in-memory device work everywhere.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use crate::device::{DeviceChannel, DeviceOpener};
use crate::errors::{PartMoveError, Result};
use crate::layout::DriveLayout;

/// Opener that refuses raw device access.
#[derive(Debug, Clone)]
pub struct UnsupportedDevices;

impl UnsupportedDevices {
    pub fn new(_layout_entries: usize) -> Self {
        UnsupportedDevices
    }
}

/// Channel type that can never be constructed.
#[derive(Debug)]
pub enum NoDevice {}

impl DeviceOpener for UnsupportedDevices {
    type Channel = NoDevice;

    fn open_disk(&self, _number: u32, _writable: bool) -> Result<NoDevice> {
        Err(PartMoveError::Unsupported)
    }

    fn open_volume(&self, _id: &str) -> Result<NoDevice> {
        Err(PartMoveError::Unsupported)
    }
}

impl DeviceChannel for NoDevice {
    fn lock(&mut self) -> Result<()> {
        match *self {}
    }
    fn dismount(&mut self) -> Result<()> {
        match *self {}
    }
    fn unlock(&mut self) -> Result<()> {
        match *self {}
    }
    fn seek(&mut self, _offset: u64) -> Result<()> {
        match *self {}
    }
    fn read_exact(&mut self, _buf: &mut [u8]) -> Result<()> {
        match *self {}
    }
    fn write_exact(&mut self, _buf: &[u8]) -> Result<()> {
        match *self {}
    }
    fn get_layout(&mut self) -> Result<DriveLayout> {
        match *self {}
    }
    fn set_layout(&mut self, _layout: &DriveLayout) -> Result<()> {
        match *self {}
    }
}

/// Append-mode log file. A new file is created 0600; an existing file keeps
/// whatever mode it already has.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let existed = path.exists();
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600) // applies on create
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)?;
    if !existed {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(f)
}

/// Create a new file with 0600 permissions and write `contents`.
/// Fails if the path already exists or is a symlink.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)?;
    f.write_all(contents)?;
    f.sync_all()
}

/// Best-effort: restrict a directory to its owner.
pub fn set_dir_mode_0700(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}
