//! Chunked sector copy between two ranges of the same device.
//!
//! Direction matters when the ranges overlap:
//! - moving toward lower addresses copies chunks low-to-high, so every write
//!   lands behind the part of the source still to be read;
//! - moving toward higher addresses copies high-to-low for the mirror reason.

use std::time::Instant;

use tracing::trace;

use crate::cancel::CancelToken;
use crate::device::DeviceChannel;
use crate::errors::Result;
use crate::model::MoveProgress;

use super::{CopyOrder, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CopyStatus {
    Complete,
    Cancelled,
}

/// Copy `size` bytes from `source` to `destination` in `chunk_size` pieces.
///
/// Cancellation is checked before the first chunk and after each chunk's
/// progress report, so a sink that cancels stops the copy at that boundary.
pub(super) fn copy_range<C: DeviceChannel>(
    disk: &mut C,
    source: u64,
    destination: u64,
    size: u64,
    chunk_size: usize,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<CopyStatus> {
    if cancel.is_cancelled() {
        return Ok(CopyStatus::Cancelled);
    }

    let order = CopyOrder::for_move(source, destination);
    let chunk = chunk_size as u64;
    let mut buf = vec![0u8; chunk.min(size) as usize];
    let started = Instant::now();
    let mut copied = 0u64;
    trace!(%order, chunk_size, "copy direction chosen");

    while copied < size {
        let count = chunk.min(size - copied);
        let relative = match order {
            CopyOrder::Descending => size - copied - count,
            CopyOrder::Ascending => copied,
        };
        let piece = &mut buf[..count as usize];

        disk.seek(source + relative)?;
        disk.read_exact(piece)?;
        disk.seek(destination + relative)?;
        disk.write_exact(piece)?;
        copied += count;

        progress.report(progress_at(copied, size, started));
        if cancel.is_cancelled() {
            trace!(copied, "cancellation observed at chunk boundary");
            return Ok(CopyStatus::Cancelled);
        }
    }

    Ok(CopyStatus::Complete)
}

fn progress_at(copied: u64, total: u64, started: Instant) -> MoveProgress {
    let elapsed = started.elapsed().as_secs_f64();
    let bytes_per_second = if elapsed > 0.0 { copied as f64 / elapsed } else { 0.0 };
    MoveProgress {
        bytes_copied: copied,
        total_bytes: total,
        bytes_per_second,
    }
}
