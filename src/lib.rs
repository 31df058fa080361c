//! Core library for `part_move`.
//!
//! Relocates a partition on a raw disk: copies its sectors to a new offset in
//! an overlap-safe order, then rewrites the starting offset of its entry in
//! the drive layout. Also computes the free regions a partition could move to.
//!
//! Modules:
//! - layout: decode/patch the binary drive layout buffer.
//! - free_space: unallocated regions from a disk/partition snapshot.
//! - device: channel/opener traits, volume lock guard, in-memory device.
//! - mover: the move state machine (lock, copy, commit, unlock).
//! - platform: OS backends (Windows raw devices; other targets refuse).
//! - config / cli / output: ambient pieces for the binary.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod device;
pub mod errors;
pub mod free_space;
pub mod layout;
pub mod model;
pub mod mover;
pub mod output;
pub mod platform;

pub use cancel::CancelToken;
pub use config::{
    Config, LogLevel, default_config_path, default_log_path, path_has_symlink_ancestor,
};
pub use errors::{PartMoveError, Result};
pub use free_space::compute as free_space_regions;
pub use layout::{DriveLayout, PartitionStyle};
pub use model::{DiskDescriptor, FreeSpaceRegion, MoveProgress, PartitionDescriptor, format_bytes};
pub use mover::{
    CopyOrder, MoveHandle, MoveOutcome, MovePhase, MovePlan, MoveRequest, Mover, ProgressSink,
};
