//! Windows raw device backend.
//!
//! Opens `\\.\PhysicalDriveN` / `\\.\C:` with `CreateFileW` and drives them
//! with `DeviceIoControl`, `SetFilePointerEx`, `ReadFile` and `WriteFile`.
//! Each `RawDevice` owns its HANDLE and closes it on drop.

use std::ffi::{OsStr, c_void};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use tracing::{debug, trace, warn};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_BEGIN, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING, ReadFile,
    SetFilePointerEx, WriteFile,
};
use windows_sys::Win32::System::IO::DeviceIoControl;

use crate::device::{DeviceChannel, DeviceOpener, disk_device_path, volume_device_path};
use crate::errors::{PartMoveError, Result};
use crate::layout::{self, DriveLayout, FetchAttempt};

const GENERIC_READ: u32 = 0x8000_0000;
const GENERIC_WRITE: u32 = 0x4000_0000;

const FSCTL_LOCK_VOLUME: u32 = 0x0009_0018;
const FSCTL_UNLOCK_VOLUME: u32 = 0x0009_001C;
const FSCTL_DISMOUNT_VOLUME: u32 = 0x0009_0020;
const IOCTL_DISK_GET_DRIVE_LAYOUT_EX: u32 = 0x0007_0050;
const IOCTL_DISK_SET_DRIVE_LAYOUT_EX: u32 = 0x0007_C050;

/// Opens raw disk and volume handles.
#[derive(Debug, Clone)]
pub struct WindowsDevices {
    layout_entries: usize,
}

impl WindowsDevices {
    /// `layout_entries` is the initial entry capacity of layout fetches.
    pub fn new(layout_entries: usize) -> Self {
        Self {
            layout_entries: layout_entries.clamp(1, layout::MAX_ENTRIES),
        }
    }
}

impl DeviceOpener for WindowsDevices {
    type Channel = RawDevice;

    fn open_disk(&self, number: u32, writable: bool) -> Result<RawDevice> {
        let access = if writable { GENERIC_READ | GENERIC_WRITE } else { GENERIC_READ };
        RawDevice::open(&disk_device_path(number), access, self.layout_entries)
    }

    fn open_volume(&self, id: &str) -> Result<RawDevice> {
        RawDevice::open(&volume_device_path(id), GENERIC_READ | GENERIC_WRITE, self.layout_entries)
    }
}

/// One open device handle.
#[derive(Debug)]
pub struct RawDevice {
    handle: HANDLE,
    path: String,
    layout_entries: usize,
}

impl Drop for RawDevice {
    fn drop(&mut self) {
        // Best-effort: nothing useful to do if closing fails.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
        trace!(path = %self.path, "handle closed");
    }
}

impl RawDevice {
    fn open(path: &str, access: u32, layout_entries: usize) -> Result<Self> {
        let wide: Vec<u16> = OsStr::new(path).encode_wide().chain(once(0)).collect();
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                access,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            let e = io::Error::last_os_error();
            return Err(PartMoveError::access(format!("open {path}"), &e));
        }
        debug!(path, "device opened");
        Ok(Self {
            handle,
            path: path.to_string(),
            layout_entries,
        })
    }

    /// Send an IOCTL; returns the byte count written to `output`.
    fn ioctl(&self, code: u32, input: Option<&[u8]>, output: Option<&mut [u8]>) -> io::Result<u32> {
        let (in_ptr, in_len) = match input {
            Some(b) => (b.as_ptr() as *const c_void, b.len() as u32),
            None => (ptr::null(), 0),
        };
        let (out_ptr, out_len) = match output {
            Some(b) => (b.as_mut_ptr() as *mut c_void, b.len() as u32),
            None => (ptr::null_mut(), 0),
        };
        let mut returned: u32 = 0;
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                in_ptr,
                in_len,
                out_ptr,
                out_len,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(returned)
    }

    fn volume_control(&self, code: u32, op: &str) -> Result<()> {
        self.ioctl(code, None, None)
            .map(|_| ())
            .map_err(|e| PartMoveError::access(format!("{op} {}", self.path), &e))
    }
}

impl DeviceChannel for RawDevice {
    fn lock(&mut self) -> Result<()> {
        self.volume_control(FSCTL_LOCK_VOLUME, "lock")
    }

    fn dismount(&mut self) -> Result<()> {
        self.volume_control(FSCTL_DISMOUNT_VOLUME, "dismount")
    }

    fn unlock(&mut self) -> Result<()> {
        self.volume_control(FSCTL_UNLOCK_VOLUME, "unlock")
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let distance = i64::try_from(offset).map_err(|_| {
            PartMoveError::InvalidRequest(format!("offset {offset} exceeds the seekable range"))
        })?;
        let ok = unsafe { SetFilePointerEx(self.handle, distance, ptr::null_mut(), FILE_BEGIN) };
        if ok == 0 {
            let e = io::Error::last_os_error();
            return Err(PartMoveError::io(format!("seek {} to {offset}", self.path), &e));
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let requested = buf.len() as u32;
        let mut read: u32 = 0;
        let ok = unsafe { ReadFile(self.handle, buf.as_mut_ptr(), requested, &mut read, ptr::null_mut()) };
        if ok == 0 {
            let e = io::Error::last_os_error();
            return Err(PartMoveError::io(format!("read {}", self.path), &e));
        }
        if read != requested {
            return Err(PartMoveError::short_transfer(
                format!("read {}", self.path),
                buf.len(),
                read as usize,
            ));
        }
        Ok(())
    }

    fn write_exact(&mut self, buf: &[u8]) -> Result<()> {
        let requested = buf.len() as u32;
        let mut written: u32 = 0;
        let ok = unsafe { WriteFile(self.handle, buf.as_ptr(), requested, &mut written, ptr::null_mut()) };
        if ok == 0 {
            let e = io::Error::last_os_error();
            return Err(PartMoveError::io(format!("write {}", self.path), &e));
        }
        if written != requested {
            return Err(PartMoveError::short_transfer(
                format!("write {}", self.path),
                buf.len(),
                written as usize,
            ));
        }
        Ok(())
    }

    /// Fetch the layout, growing the buffer per `layout::next_capacity`.
    fn get_layout(&mut self) -> Result<DriveLayout> {
        let mut entries = self.layout_entries;
        loop {
            let mut buf = vec![0u8; layout::required_len(entries)];
            let next = match self.ioctl(IOCTL_DISK_GET_DRIVE_LAYOUT_EX, None, Some(&mut buf)) {
                Ok(_) => {
                    let fetched = DriveLayout::from_bytes(buf);
                    let count = fetched.entry_count()?;
                    match layout::next_capacity(entries, FetchAttempt::Fetched { count }) {
                        Ok(None) => {
                            trace!(path = %self.path, count, capacity = entries, "drive layout fetched");
                            return Ok(fetched);
                        }
                        Ok(Some(n)) => n,
                        Err(e) => {
                            warn!(path = %self.path, count, "drive layout exceeds supported entry count");
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    let attempt = FetchAttempt::Failed { os_code: e.raw_os_error() };
                    match layout::next_capacity(entries, attempt) {
                        Ok(Some(n)) => n,
                        _ => return Err(PartMoveError::io(format!("get drive layout {}", self.path), &e)),
                    }
                }
            };
            debug!(path = %self.path, from = entries, to = next, "drive layout buffer too small; retrying");
            entries = next;
        }
    }

    fn set_layout(&mut self, layout: &DriveLayout) -> Result<()> {
        self.ioctl(IOCTL_DISK_SET_DRIVE_LAYOUT_EX, Some(layout.as_bytes()), None)
            .map(|_| ())
            .map_err(|e| PartMoveError::io(format!("set drive layout {}", self.path), &e))
    }
}

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Create a new config file; fails if it already exists.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
    f.write_all(contents)?;
    f.sync_all()
}

/// No-op on Windows; ACLs are inherited from the parent directory.
pub fn set_dir_mode_0700(_path: &Path) -> io::Result<()> {
    Ok(())
}
