//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{LoadResult, create_template_config, load_config_from_xml_path, load_or_init};

/// Environment variable naming an explicit config file (or directory holding `config.xml`).
pub const CONFIG_ENV: &str = "PART_MOVE_CONFIG";
/// Default copy chunk, in MiB.
pub const CHUNK_SIZE_MIB_DEFAULT: usize = 4;
/// Initial entry capacity when fetching a drive layout.
pub const LAYOUT_ENTRIES_DEFAULT: usize = 128;
pub const CHUNK_SIZE_MIB_MAX: usize = 1024;
pub const LAYOUT_ENTRIES_MAX: usize = crate::layout::MAX_ENTRIES;
