//! Config validation logic.

use anyhow::{Result, bail};
use tracing::debug;

use super::types::Config;
use super::{CHUNK_SIZE_MIB_MAX, LAYOUT_ENTRIES_MAX};
use crate::mover::SECTOR_SIZE;

impl Config {
    /// Check chunk size and layout capacity bounds.
    pub fn validate(&self) -> Result<()> {
        let max_chunk = CHUNK_SIZE_MIB_MAX * 1024 * 1024;
        if self.chunk_size == 0 || self.chunk_size > max_chunk {
            bail!(
                "chunk size {} bytes is out of range (at most {CHUNK_SIZE_MIB_MAX} MiB)",
                self.chunk_size
            );
        }
        if self.chunk_size % SECTOR_SIZE != 0 {
            bail!("chunk size {} bytes is not a multiple of {SECTOR_SIZE}", self.chunk_size);
        }
        if self.layout_entries == 0 || self.layout_entries > LAYOUT_ENTRIES_MAX {
            bail!(
                "layout_entries {} is out of range (1 ..= {LAYOUT_ENTRIES_MAX})",
                self.layout_entries
            );
        }
        debug!(
            chunk_size = self.chunk_size,
            layout_entries = self.layout_entries,
            "config validated"
        );
        Ok(())
    }
}
