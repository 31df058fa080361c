//! Typed error definitions for part_move.
//! Provides the failure modes of a partition move with enough detail
//! (operation, OS code, readable description) to present a precise cause.

use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PartMoveError>;

#[derive(Debug, Error)]
pub enum PartMoveError {
    /// Open/lock/dismount denied, e.g. the volume is busy.
    #[error("{op}: {message}")]
    Access {
        op: String,
        code: Option<i32>,
        message: String,
    },

    /// A raw read/write/layout call failed or transferred fewer bytes than requested.
    #[error("{op}: {message}")]
    Io {
        op: String,
        code: Option<i32>,
        message: String,
    },

    /// The committed layout no longer holds an entry at the planned source offset.
    #[error("no partition entry starts at offset {offset} in the drive layout; the disk changed since the move was planned")]
    LayoutMismatch { offset: u64 },

    #[error("drive layout buffer too small: entry {index} needs {needed} bytes, buffer has {len}")]
    BufferTooSmall { index: usize, needed: usize, len: usize },

    #[error("raw disk access is not supported on this platform")]
    Unsupported,

    #[error("invalid move request: {0}")]
    InvalidRequest(String),
}

impl PartMoveError {
    /// Stable numeric code for structured logs.
    pub fn code(&self) -> u8 {
        match self {
            PartMoveError::Access { .. } => 10,
            PartMoveError::Io { .. } => 11,
            PartMoveError::LayoutMismatch { .. } => 12,
            PartMoveError::BufferTooSmall { .. } => 13,
            PartMoveError::Unsupported => 14,
            PartMoveError::InvalidRequest(_) => 15,
        }
    }

    /// Raw OS error code, when the failure came from the OS.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            PartMoveError::Access { code, .. } | PartMoveError::Io { code, .. } => *code,
            _ => None,
        }
    }

    /// Build an `Access` error from an OS error.
    pub fn access(op: impl Into<String>, e: &io::Error) -> Self {
        PartMoveError::Access {
            op: op.into(),
            code: e.raw_os_error(),
            message: describe_io_error(e),
        }
    }

    /// Build an `Io` error from an OS error.
    pub fn io(op: impl Into<String>, e: &io::Error) -> Self {
        PartMoveError::Io {
            op: op.into(),
            code: e.raw_os_error(),
            message: describe_io_error(e),
        }
    }

    /// `Io` error for a transfer that moved fewer bytes than requested.
    pub fn short_transfer(op: impl Into<String>, requested: usize, transferred: usize) -> Self {
        PartMoveError::Io {
            op: op.into(),
            code: None,
            message: format!("requested {requested} bytes, transferred {transferred}"),
        }
    }
}

/// Format the OS description plus a platform-aware hint and the raw code.
pub fn describe_io_error(e: &io::Error) -> String {
    let mut msg = e.to_string();

    if let Some(code) = e.raw_os_error() {
        #[cfg(unix)]
        {
            match code {
                libc::EACCES | libc::EPERM => {
                    msg.push_str(" (permission denied; run with administrative rights)");
                }
                libc::EBUSY => {
                    msg.push_str(" (device busy; close programs using this volume)");
                }
                libc::EROFS => msg.push_str(" (read-only device)"),
                libc::ENOENT | libc::ENXIO => msg.push_str(" (device not found)"),
                libc::EIO => msg.push_str(" (device I/O error; check the disk health)"),
                _ => {}
            }
        }
        #[cfg(windows)]
        {
            match code {
                5 => msg.push_str(" (access denied; run as Administrator)"), // ERROR_ACCESS_DENIED
                2 | 3 => msg.push_str(" (device not found)"), // FILE/PATH NOT FOUND
                19 => msg.push_str(" (write protected media)"), // ERROR_WRITE_PROTECT
                21 => msg.push_str(" (device not ready)"), // ERROR_NOT_READY
                32 => msg.push_str(" (sharing violation; the volume is in use)"), // ERROR_SHARING_VIOLATION
                33 => msg.push_str(" (lock violation; close any open files on this partition)"), // ERROR_LOCK_VIOLATION
                122 | 234 => msg.push_str(" (buffer too small for the reply)"), // INSUFFICIENT_BUFFER / MORE_DATA
                1117 => msg.push_str(" (device I/O error; check the disk health)"), // ERROR_IO_DEVICE
                _ => {}
            }
        }
        msg.push_str(&format!(" [os code: {code}]"));
    } else if e.kind() == io::ErrorKind::PermissionDenied {
        msg.push_str(" (permission denied)");
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_error_keeps_os_code() {
        let err = PartMoveError::access("lock volume C:", &io::Error::from_raw_os_error(5));
        assert_eq!(err.os_code(), Some(5));
        assert_eq!(err.code(), 10);
        let msg = err.to_string();
        assert!(msg.starts_with("lock volume C:"));
        assert!(msg.contains("[os code: 5]"), "msg was: {msg}");
    }

    #[test]
    fn short_transfer_has_no_os_code() {
        let err = PartMoveError::short_transfer("read", 4096, 512);
        assert_eq!(err.os_code(), None);
        assert!(err.to_string().contains("requested 4096 bytes, transferred 512"));
    }

    #[cfg(unix)]
    #[test]
    fn busy_hint_present() {
        let msg = describe_io_error(&io::Error::from_raw_os_error(libc::EBUSY));
        assert!(msg.contains("device busy"), "msg was: {msg}");
    }
}
