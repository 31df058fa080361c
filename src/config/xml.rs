//! Reading and seeding `config.xml`.
//!
//! Unknown elements are rejected, so a misspelled setting is an error rather
//! than a silent default. A template is written on first run unless
//! PART_MOVE_CONFIG names the file.

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use super::{CHUNK_SIZE_MIB_DEFAULT, CONFIG_ENV, LAYOUT_ENTRIES_DEFAULT};
use crate::platform::{set_dir_mode_0700, write_config_secure_new_0600};

/// On-disk shape of `<config>`; every element is optional.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    chunk_size_mib: Option<usize>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    layout_entries: Option<usize>,
}

// Trims surrounding whitespace; an empty element counts as unset.
fn de_usize_trimmed_opt<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid number '{s}': {e}"))),
    }
}

/// Outcome of `load_or_init`.
#[derive(Debug)]
pub enum LoadResult {
    /// Config read from this file.
    Loaded(Config, PathBuf),
    /// No config existed; a template was written here and defaults apply.
    CreatedTemplate(PathBuf),
    /// No config and none could be created; defaults apply.
    Defaults,
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = parsed.log_level.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_level = trimmed.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
        }
    }
    // An empty <log_file/> disables file logging; an absent one keeps the default.
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        cfg.log_file = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
    }
    if let Some(mib) = parsed.chunk_size_mib {
        cfg.chunk_size = mib
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow!("chunk_size_mib {mib} is too large"))?;
    }
    if let Some(n) = parsed.layout_entries {
        cfg.layout_entries = n;
    }
    Ok(cfg)
}

/// Read and convert one config file. Values are not validated here.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;
    let cfg = xml_to_config(parsed).with_context(|| format!("config xml '{}'", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Resolve the config path and load it.
///
/// A missing file at the default location gets a template; a missing file
/// named by PART_MOVE_CONFIG is an error.
pub fn load_or_init() -> Result<LoadResult> {
    let path = default_config_path().context("resolve config path")?;
    if path.exists() {
        let cfg = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded(cfg, path));
    }
    if env::var_os(CONFIG_ENV).is_some() {
        bail!("config file named by {CONFIG_ENV} does not exist: {}", path.display());
    }
    match create_template_config(&path) {
        Ok(()) => Ok(LoadResult::CreatedTemplate(path)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not create template config; using defaults");
            Ok(LoadResult::Defaults)
        }
    }
}

/// Create the default template config file and its parent directory.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!("not writing a template under a symlinked directory: {}", path.display());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir '{}'", parent.display()))?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = match default_log_path() {
        Ok(p) => p.display().to_string(),
        Err(_) => String::new(),
    };

    let content = format!(
        "<!--\n  part_move configuration (XML)\n\n    log_level       -> quiet | normal | info | debug\n    log_file        -> path to log file (optional; empty disables file logging)\n    chunk_size_mib  -> copy chunk size in MiB (1..=1024)\n    layout_entries  -> initial partition entry capacity when reading the drive layout (1..=4096)\n\n  CLI flags override XML values.\n-->\n<config>\n  <log_level>normal</log_level>\n  <log_file>{suggested_log}</log_file>\n  <chunk_size_mib>{CHUNK_SIZE_MIB_DEFAULT}</chunk_size_mib>\n  <layout_entries>{LAYOUT_ENTRIES_DEFAULT}</layout_entries>\n</config>\n"
    );

    write_config_secure_new_0600(path, content.as_bytes())
        .with_context(|| format!("write template config '{}'", path.display()))?;

    info!(path = %path.display(), "template config written");
    Ok(())
}
