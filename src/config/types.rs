//! Runtime settings and the verbosity enum shared by config and CLI.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths;
use super::{CHUNK_SIZE_MIB_DEFAULT, LAYOUT_ENTRIES_DEFAULT};

/// Console and file verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    /// Adds per-phase detail of a move.
    Info,
    /// Adds per-chunk tracing.
    Debug,
}

// Accepted spellings; the first name of each row is canonical.
const LEVEL_NAMES: &[(LogLevel, &[&str])] = &[
    (LogLevel::Quiet, &["quiet", "error", "none"]),
    (LogLevel::Normal, &["normal"]),
    (LogLevel::Info, &["info", "verbose", "detailed"]),
    (LogLevel::Debug, &["debug", "trace"]),
];

impl LogLevel {
    /// Case-insensitive lookup over the accepted spellings.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim();
        LEVEL_NAMES
            .iter()
            .find(|(_, names)| names.iter().any(|n| n.eq_ignore_ascii_case(wanted)))
            .map(|(lvl, _)| *lvl)
    }

    pub fn as_str(self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find(|(lvl, _)| *lvl == self)
            .map_or("normal", |(_, names)| names[0])
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("invalid log level '{s}' (expected quiet, normal, info or debug)")
        })
    }
}

/// Settings after the XML file and CLI overrides are merged.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LogLevel,
    /// `None` disables file logging.
    pub log_file: Option<PathBuf>,
    /// Bytes per copy chunk; a whole number of sectors.
    pub chunk_size: usize,
    /// Entry capacity of the first drive-layout fetch.
    pub layout_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_file: paths::default_log_path().ok(),
            chunk_size: CHUNK_SIZE_MIB_DEFAULT * 1024 * 1024,
            layout_entries: LAYOUT_ENTRIES_DEFAULT,
        }
    }
}
