//! Command-line surface: the `free-space` and `move` subcommands plus the
//! global logging flags. Sizes and offsets accept plain bytes or binary
//! suffixes (K, M, G, T).

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::types::{Config, LogLevel};

/// Flags given here win over `config.xml`.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Move a disk partition by copying its sectors and rewriting the drive layout"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Same as `--log-level debug`, and wins over it.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// quiet, normal, info or debug.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Show which config file would be read, then exit.
    #[arg(long)]
    pub print_config: bool,

    /// Log events as JSON objects.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List unallocated regions that could receive a partition.
    FreeSpace(FreeSpaceArgs),
    /// Copy a partition to a new offset and update its layout entry.
    Move(MoveArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FreeSpaceArgs {
    /// Total disk size.
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub disk_size: u64,

    /// Existing partition as START:SIZE; repeat for each partition.
    #[arg(long = "partition", short = 'p', value_name = "START:SIZE", value_parser = parse_extent)]
    pub partitions: Vec<(u64, u64)>,

    /// Smallest region worth reporting (usually the size of the partition to move).
    #[arg(long, value_name = "SIZE", value_parser = parse_size, default_value = "1")]
    pub min_size: u64,

    /// Print regions as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct MoveArgs {
    /// Physical disk number.
    #[arg(long, value_name = "N")]
    pub disk: u32,

    /// Volume to lock and dismount during the move (e.g. `E:` or a volume GUID path).
    #[arg(long, value_name = "ID")]
    pub volume: Option<String>,

    /// Current starting offset of the partition.
    #[arg(long, value_name = "OFFSET", value_parser = parse_size)]
    pub from: u64,

    /// New starting offset.
    #[arg(long, value_name = "OFFSET", value_parser = parse_size)]
    pub to: u64,

    /// Partition size.
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub size: u64,

    /// Copy chunk size in MiB (overrides config).
    #[arg(long, value_name = "N")]
    pub chunk_size_mib: Option<usize>,

    /// Print the planned move without touching the disk.
    #[arg(long, help = "Show what would be done, but do not touch the disk")]
    pub dry_run: bool,
}

impl Args {
    /// Level requested on the command line, if any.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        match self.debug {
            true => Some(LogLevel::Debug),
            false => self.log_level,
        }
    }

    /// Overwrite the config values that were given as flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(Command::Move(m)) = &self.command
            && let Some(mib) = m.chunk_size_mib
        {
            cfg.chunk_size = mib.saturating_mul(1024 * 1024);
        }
    }
}

/// Parse a byte count: plain digits or a binary suffix (`K`, `M`, `G`, `T`,
/// optionally followed by `iB` or `B`), case-insensitive.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let t = s.trim();
    let lower = t.to_ascii_lowercase();
    let stripped = lower
        .strip_suffix("ib")
        .or_else(|| lower.strip_suffix('b'))
        .unwrap_or(&lower);
    let (digits, shift) = match stripped.chars().last() {
        Some('k') => (&stripped[..stripped.len() - 1], 10),
        Some('m') => (&stripped[..stripped.len() - 1], 20),
        Some('g') => (&stripped[..stripped.len() - 1], 30),
        Some('t') => (&stripped[..stripped.len() - 1], 40),
        _ => (stripped, 0),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: '{t}'"))?;
    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size out of range: '{t}'"))
}

/// Parse `START:SIZE`.
pub fn parse_extent(s: &str) -> Result<(u64, u64), String> {
    let (start, size) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:SIZE, got '{s}'"))?;
    Ok((parse_size(start)?, parse_size(size)?))
}

pub fn parse() -> Args {
    <Args as Parser>::parse()
}
