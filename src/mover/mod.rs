//! Partition move orchestration.
//!
//! Sequence: `Idle → Locking → Copying → Committing → Unlocking →
//! {Done | Cancelled | Failed}`.
//!
//! - Locking only happens when the partition has a volume; the volume stays
//!   locked and dismounted until the move ends, whatever the outcome.
//! - Copying is chunked and cancellable at chunk boundaries. Until the commit
//!   the layout still points at the original offset, so the source partition
//!   stays authoritative.
//! - Committing rewrites one layout entry in a single call and is never
//!   cancelled.
//!
//! Callers must not run two moves against the same disk concurrently.

mod commit;
mod copy;

use std::fmt;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, info_span};

use crate::cancel::CancelToken;
use crate::device::{DeviceOpener, VolumeLock};
use crate::errors::{PartMoveError, Result};
use crate::model::MoveProgress;

use copy::CopyStatus;

/// Default copy chunk (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;
/// Chunk sizes must be a multiple of this.
pub const SECTOR_SIZE: usize = 512;

/// What to move and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub disk_number: u32,
    /// Volume to lock and dismount; `None` when the partition has no volume.
    pub volume: Option<String>,
    pub source_offset: u64,
    pub destination_offset: u64,
    pub size: u64,
}

impl MoveRequest {
    /// Both ranges must be addressable as signed 64-bit offsets.
    pub fn validate(&self) -> Result<()> {
        let limit = i64::MAX as u64;
        for (name, offset) in [
            ("source", self.source_offset),
            ("destination", self.destination_offset),
        ] {
            match offset.checked_add(self.size) {
                Some(end) if end <= limit => {}
                _ => {
                    return Err(PartMoveError::InvalidRequest(format!(
                        "{name} range {offset}+{} exceeds the addressable disk range",
                        self.size
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Order in which chunks are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOrder {
    /// Lowest chunk first; used unless the destination is above the source.
    Ascending,
    /// Highest chunk first, so overlapping writes never clobber unread source.
    Descending,
}

impl CopyOrder {
    pub fn for_move(source: u64, destination: u64) -> Self {
        if destination > source {
            CopyOrder::Descending
        } else {
            CopyOrder::Ascending
        }
    }
}

impl fmt::Display for CopyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CopyOrder::Ascending => "low to high",
            CopyOrder::Descending => "high to low",
        })
    }
}

/// What a validated move will do, computed without touching a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub order: CopyOrder,
    pub chunk_size: usize,
    pub chunks: u64,
}

/// Terminal outcome of a move that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Data copied and layout committed.
    Done,
    /// Interrupted during the copy; source intact, no commit attempted.
    Cancelled,
}

/// Move state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    Idle,
    Locking,
    Copying,
    Committing,
    Unlocking,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for MovePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovePhase::Idle => "idle",
            MovePhase::Locking => "locking",
            MovePhase::Copying => "copying",
            MovePhase::Committing => "committing",
            MovePhase::Unlocking => "unlocking",
            MovePhase::Done => "done",
            MovePhase::Cancelled => "cancelled",
            MovePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receives progress after every copied chunk, on the thread running the move.
pub trait ProgressSink: Send {
    fn report(&mut self, progress: MoveProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(MoveProgress) + Send,
{
    fn report(&mut self, progress: MoveProgress) {
        self(progress)
    }
}

/// Runs partition moves through a `DeviceOpener`.
#[derive(Debug, Clone)]
pub struct Mover<O> {
    opener: O,
    chunk_size: usize,
}

impl<O: DeviceOpener> Mover<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different copy chunk; must be a positive multiple of `SECTOR_SIZE`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size % SECTOR_SIZE != 0 {
            return Err(PartMoveError::InvalidRequest(format!(
                "chunk size {chunk_size} is not a positive multiple of {SECTOR_SIZE}"
            )));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Validate `request` and describe the copy `run` would perform.
    pub fn plan(&self, request: &MoveRequest) -> Result<MovePlan> {
        request.validate()?;
        Ok(MovePlan {
            order: CopyOrder::for_move(request.source_offset, request.destination_offset),
            chunk_size: self.chunk_size,
            chunks: request.size.div_ceil(self.chunk_size as u64),
        })
    }

    /// Execute the move on the calling thread.
    pub fn run(
        &self,
        request: &MoveRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<MoveOutcome> {
        let span = info_span!(
            "move",
            disk = request.disk_number,
            from = request.source_offset,
            to = request.destination_offset,
            size = request.size
        );
        let _enter = span.enter();
        debug!(phase = %MovePhase::Idle, volume = ?request.volume, "move requested");

        let result = self.plan(request).and_then(|plan| {
            debug!(order = %plan.order, chunks = plan.chunks, "move planned");
            self.execute(request, progress, cancel)
        });
        match &result {
            Ok(MoveOutcome::Done) => info!(phase = %MovePhase::Done, "partition moved"),
            Ok(MoveOutcome::Cancelled) => {
                info!(phase = %MovePhase::Cancelled, "move cancelled; source partition unchanged")
            }
            Err(e) => error!(phase = %MovePhase::Failed, code = e.code(), error = %e, "move failed"),
        }
        result
    }

    fn execute(
        &self,
        request: &MoveRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<MoveOutcome> {
        let volume_lock = match request.volume.as_deref() {
            Some(id) => {
                debug!(phase = %MovePhase::Locking, volume = id, "locking volume");
                let channel = self.opener.open_volume(id)?;
                Some(VolumeLock::acquire(channel, id)?)
            }
            None => None,
        };

        let result = self.copy_and_commit(request, progress, cancel);

        if let Some(lock) = volume_lock {
            debug!(phase = %MovePhase::Unlocking, volume = lock.volume(), "releasing volume");
            drop(lock);
        }
        result
    }

    fn copy_and_commit(
        &self,
        request: &MoveRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<MoveOutcome> {
        let mut disk = self.opener.open_disk(request.disk_number, true)?;

        debug!(phase = %MovePhase::Copying, chunk_size = self.chunk_size, "copying sectors");
        let status = copy::copy_range(
            &mut disk,
            request.source_offset,
            request.destination_offset,
            request.size,
            self.chunk_size,
            progress,
            cancel,
        )?;
        if status == CopyStatus::Cancelled {
            return Ok(MoveOutcome::Cancelled);
        }

        debug!(phase = %MovePhase::Committing, "updating partition table entry");
        commit::commit_new_offset(&mut disk, request.source_offset, request.destination_offset)?;
        Ok(MoveOutcome::Done)
    }
}

impl<O> Mover<O>
where
    O: DeviceOpener + Send + 'static,
{
    /// Run the move on a dedicated worker thread.
    ///
    /// Progress is reported from the worker; thread-affine consumers must
    /// redispatch it themselves.
    pub fn spawn<P>(self, request: MoveRequest, mut progress: P, cancel: CancelToken) -> Result<MoveHandle>
    where
        P: ProgressSink + 'static,
    {
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("part-move".into())
            .spawn(move || self.run(&request, &mut progress, &cancel))
            .map_err(|e| PartMoveError::io("spawn move worker", &e))?;
        Ok(MoveHandle { handle, cancel: token })
    }
}

/// Handle to a move running on a worker thread.
pub struct MoveHandle {
    handle: JoinHandle<Result<MoveOutcome>>,
    cancel: CancelToken,
}

impl MoveHandle {
    /// Ask the worker to stop at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the move to end.
    pub fn join(self) -> Result<MoveOutcome> {
        self.handle.join().unwrap_or_else(|_| {
            Err(PartMoveError::Io {
                op: "move worker".into(),
                code: None,
                message: "worker thread panicked".into(),
            })
        })
    }
}
