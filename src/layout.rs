//! Drive layout buffer codec.
//!
//! The buffer is the OS drive-layout structure exchanged verbatim with the
//! layout query/update calls (Windows `DRIVE_LAYOUT_INFORMATION_EX`), all
//! integers little-endian:
//!
//! ```text
//!   [0]   partition style      u32
//!   [4]   entry count          u32
//!   [8]   MBR/GPT header union (40 bytes)
//!   [48]  entry[0], entry[1], ... 144 bytes each
//!
//! entry:
//!   [0]   partition style      u32 (+4 padding)
//!   [8]   starting offset      i64
//!   [16]  length               i64
//!   [24]  partition number     u32
//!   [28]  rewrite partition    u8
//!   [29]  service partition    u8 (+2 padding)
//!   [32]  MBR/GPT entry union  (112 bytes)
//! ```
//!
//! Only bounds are checked here; whether an offset belongs to a real
//! partition is decided by the caller.

use crate::errors::{PartMoveError, Result};

pub const HEADER_SIZE: usize = 48;
pub const ENTRY_SIZE: usize = 144;

const STYLE_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 4;
const ENTRY_START_OFFSET: usize = 8;
const ENTRY_LENGTH_OFFSET: usize = 16;
const ENTRY_NUMBER_OFFSET: usize = 24;
const ENTRY_REWRITE_OFFSET: usize = 28;

/// Partitioning scheme recorded in the layout header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStyle {
    Mbr,
    Gpt,
    Raw,
    Unknown(u32),
}

impl PartitionStyle {
    fn from_raw(v: u32) -> Self {
        match v {
            0 => PartitionStyle::Mbr,
            1 => PartitionStyle::Gpt,
            2 => PartitionStyle::Raw,
            other => PartitionStyle::Unknown(other),
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            PartitionStyle::Mbr => 0,
            PartitionStyle::Gpt => 1,
            PartitionStyle::Raw => 2,
            PartitionStyle::Unknown(v) => v,
        }
    }
}

/// Upper bound for the entry capacity of a layout fetch.
pub const MAX_ENTRIES: usize = 4096;

/// OS codes meaning the layout buffer was too small for the answer.
pub const ERROR_INSUFFICIENT_BUFFER: i32 = 122;
pub const ERROR_MORE_DATA: i32 = 234;

/// Bytes needed for a header plus `entries` partition entries.
pub const fn required_len(entries: usize) -> usize {
    HEADER_SIZE + entries * ENTRY_SIZE
}

/// Result of one layout query made with a given entry capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttempt {
    /// The call succeeded and the header reports `count` entries.
    Fetched { count: usize },
    /// The call failed with this OS code.
    Failed { os_code: Option<i32> },
}

/// Capacity for the next layout query after `attempt`, or `None` when the
/// buffer already holds the whole layout.
///
/// A too-small buffer doubles, a truncated answer grows to the reported
/// count, and nothing grows past `MAX_ENTRIES`. Any other OS failure, or a
/// layout that still does not fit at the cap, is an `Io` error.
pub fn next_capacity(capacity: usize, attempt: FetchAttempt) -> Result<Option<usize>> {
    let too_many = |code| PartMoveError::Io {
        op: "get drive layout".into(),
        code,
        message: format!("more than {MAX_ENTRIES} partition entries"),
    };
    match attempt {
        FetchAttempt::Fetched { count } if count <= capacity => Ok(None),
        FetchAttempt::Fetched { count } if count <= MAX_ENTRIES => Ok(Some(count)),
        FetchAttempt::Fetched { .. } => Err(too_many(None)),
        FetchAttempt::Failed {
            os_code: code @ Some(ERROR_INSUFFICIENT_BUFFER | ERROR_MORE_DATA),
        } => {
            if capacity >= MAX_ENTRIES {
                return Err(too_many(code));
            }
            Ok(Some(capacity.max(1).saturating_mul(2).min(MAX_ENTRIES)))
        }
        FetchAttempt::Failed { os_code } => Err(PartMoveError::Io {
            op: "get drive layout".into(),
            code: os_code,
            message: "drive layout query failed".into(),
        }),
    }
}

/// Owned drive layout buffer. Fetched fresh for every layout-modifying
/// operation and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveLayout {
    bytes: Vec<u8>,
}

impl DriveLayout {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a buffer describing the given `(start, length)` extents.
    /// Entry style follows the header; partition numbers start at 1.
    ///
    /// Fails with `InvalidRequest` when an extent does not fit the signed
    /// 64-bit fields or there are more than `MAX_ENTRIES` extents.
    pub fn from_extents(style: PartitionStyle, extents: &[(u64, u64)]) -> Result<Self> {
        if extents.len() > MAX_ENTRIES {
            return Err(PartMoveError::InvalidRequest(format!(
                "{} partition entries exceed the limit of {MAX_ENTRIES}",
                extents.len()
            )));
        }
        let signed = |v: u64, what: &str, i: usize| {
            i64::try_from(v).map_err(|_| {
                PartMoveError::InvalidRequest(format!("entry {i} {what} {v} does not fit in i64"))
            })
        };
        let mut bytes = vec![0u8; required_len(extents.len())];
        put_u32(&mut bytes, STYLE_OFFSET, style.to_raw());
        put_u32(&mut bytes, COUNT_OFFSET, extents.len() as u32);
        for (i, &(start, len)) in extents.iter().enumerate() {
            let base = HEADER_SIZE + i * ENTRY_SIZE;
            put_u32(&mut bytes, base, style.to_raw());
            put_i64(&mut bytes, base + ENTRY_START_OFFSET, signed(start, "start", i)?);
            put_i64(&mut bytes, base + ENTRY_LENGTH_OFFSET, signed(len, "length", i)?);
            put_u32(&mut bytes, base + ENTRY_NUMBER_OFFSET, i as u32 + 1);
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn partition_style(&self) -> Result<PartitionStyle> {
        self.ensure_len(0, STYLE_OFFSET + 4)?;
        Ok(PartitionStyle::from_raw(get_u32(&self.bytes, STYLE_OFFSET)))
    }

    /// Number of entries the OS reported in the header.
    pub fn entry_count(&self) -> Result<usize> {
        self.ensure_len(0, COUNT_OFFSET + 4)?;
        Ok(get_u32(&self.bytes, COUNT_OFFSET) as usize)
    }

    pub fn read_start_offset(&self, index: usize) -> Result<i64> {
        let base = self.entry_base(index)?;
        Ok(get_i64(&self.bytes, base + ENTRY_START_OFFSET))
    }

    pub fn write_start_offset(&mut self, index: usize, value: i64) -> Result<()> {
        let base = self.entry_base(index)?;
        put_i64(&mut self.bytes, base + ENTRY_START_OFFSET, value);
        Ok(())
    }

    pub fn read_length(&self, index: usize) -> Result<i64> {
        let base = self.entry_base(index)?;
        Ok(get_i64(&self.bytes, base + ENTRY_LENGTH_OFFSET))
    }

    pub fn read_partition_number(&self, index: usize) -> Result<u32> {
        let base = self.entry_base(index)?;
        Ok(get_u32(&self.bytes, base + ENTRY_NUMBER_OFFSET))
    }

    /// Set the "rewrite partition" flag so the OS applies this entry on commit.
    pub fn mark_dirty(&mut self, index: usize) -> Result<()> {
        let base = self.entry_base(index)?;
        self.bytes[base + ENTRY_REWRITE_OFFSET] = 1;
        Ok(())
    }

    pub fn is_dirty(&self, index: usize) -> Result<bool> {
        let base = self.entry_base(index)?;
        Ok(self.bytes[base + ENTRY_REWRITE_OFFSET] != 0)
    }

    /// Index of the first entry whose starting offset equals `offset`.
    pub fn find_by_start_offset(&self, offset: u64) -> Result<Option<usize>> {
        let Ok(wanted) = i64::try_from(offset) else {
            return Ok(None);
        };
        for i in 0..self.entry_count()? {
            if self.read_start_offset(i)? == wanted {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn entry_base(&self, index: usize) -> Result<usize> {
        self.ensure_len(index, required_len(index + 1))?;
        Ok(HEADER_SIZE + index * ENTRY_SIZE)
    }

    fn ensure_len(&self, index: usize, needed: usize) -> Result<()> {
        if needed > self.bytes.len() {
            return Err(PartMoveError::BufferTooSmall {
                index,
                needed,
                len: self.bytes.len(),
            });
        }
        Ok(())
    }
}

fn get_u32(b: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn get_i64(b: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    i64::from_le_bytes(raw)
}

fn put_u32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_i64(b: &mut [u8], at: usize, v: i64) {
    b[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_are_little_endian() {
        let layout = DriveLayout::from_extents(PartitionStyle::Gpt, &[(1 << 20, 1 << 30)]).unwrap();
        let b = layout.as_bytes();
        assert_eq!(&b[0..4], &[1, 0, 0, 0]);
        assert_eq!(&b[4..8], &[1, 0, 0, 0]);
        assert_eq!(&b[48 + 8..48 + 16], &(1u64 << 20).to_le_bytes());
        assert_eq!(&b[48 + 16..48 + 24], &(1u64 << 30).to_le_bytes());
        assert_eq!(layout.len(), 48 + 144);
    }

    #[test]
    fn entry_count_needs_header_prefix() {
        let layout = DriveLayout::from_bytes(vec![0u8; 6]);
        assert!(matches!(
            layout.entry_count(),
            Err(PartMoveError::BufferTooSmall { needed: 8, len: 6, .. })
        ));
    }

    #[test]
    fn find_ignores_offsets_beyond_i64() {
        let layout = DriveLayout::from_extents(PartitionStyle::Mbr, &[(0, 10)]).unwrap();
        assert_eq!(layout.find_by_start_offset(u64::MAX).unwrap(), None);
        assert_eq!(layout.find_by_start_offset(0).unwrap(), Some(0));
    }

    #[test]
    fn partition_numbers_start_at_one() {
        let layout = DriveLayout::from_extents(PartitionStyle::Mbr, &[(0, 10), (10, 10)]).unwrap();
        assert_eq!(layout.read_partition_number(1).unwrap(), 2);
        assert_eq!(layout.partition_style().unwrap(), PartitionStyle::Mbr);
    }
}
