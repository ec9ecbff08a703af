//! Build configuration.
//!
//! Handles loading, validating, and merging `workbase.toml`. Stock defaults
//! are serialized to a TOML table, then the user file is merged on top, so a
//! config file only needs the keys it changes.
//!
//! ## Config File Location
//!
//! ```text
//! database/
//! ├── workbase.toml            # Picked up automatically
//! ├── .workbase/
//! │   └── build-metadata.json
//! ├── 010-first-work/
//! │   └── description.md
//! └── 020-second-work/
//!     └── ...
//! ```
//!
//! `--config PATH` points at a file anywhere else instead.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_language = "default"     # Language of text outside `:: lang` sections
//! scattered_mode_folder = ".workbase"
//! build_metadata_file = ".workbase/build-metadata.json"
//!
//! [media]
//! at = "media"                     # Where media files are copied to
//!
//! [extract_colors]
//! enabled = true
//!
//! [lock]
//! # stale_after_secs = 3600        # Reclaim locks older than this
//! ```
//!
//! Relative paths resolve against the database root. Unknown keys are
//! rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the database root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "workbase.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `workbase.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Language name for text that precedes any `:: lang` marker.
    pub default_language: String,
    /// Subfolder holding `description.md` in scattered mode.
    pub scattered_mode_folder: String,
    /// Where the previous build date is recorded.
    pub build_metadata_file: String,
    pub media: MediaConfig,
    pub extract_colors: ExtractColorsConfig,
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_language: "default".to_string(),
            scattered_mode_folder: ".workbase".to_string(),
            build_metadata_file: ".workbase/build-metadata.json".to_string(),
            media: MediaConfig::default(),
            extract_colors: ExtractColorsConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Media output directory.
    pub at: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            at: "media".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractColorsConfig {
    pub enabled: bool,
}

impl Default for ExtractColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Unset: a leftover lock always blocks the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_after_secs: Option<u64>,
}

impl Config {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_language must not be empty".into(),
            ));
        }
        if self.scattered_mode_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scattered_mode_folder must not be empty".into(),
            ));
        }
        if self.build_metadata_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "build_metadata_file must not be empty".into(),
            ));
        }
        if self.media.at.trim().is_empty() {
            return Err(ConfigError::Validation("media.at must not be empty".into()));
        }
        if self.lock.stale_after_secs == Some(0) {
            return Err(ConfigError::Validation(
                "lock.stale_after_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Media output directory, resolved against the database root.
    pub fn media_dir(&self, database_root: &Path) -> PathBuf {
        resolve(database_root, &self.media.at)
    }

    /// Build metadata file, resolved against the database root.
    pub fn build_metadata_path(&self, database_root: &Path) -> PathBuf {
        resolve(database_root, &self.build_metadata_file)
    }

    pub fn stale_lock_after(&self) -> Option<Duration> {
        self.lock.stale_after_secs.map(Duration::from_secs)
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config for a database.
///
/// An explicit path must exist. Without one, `<database>/workbase.toml` is
/// used when present and the stock defaults otherwise.
pub fn load_config(database_root: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )));
            }
            load_raw_config(path)?
        }
        None => load_raw_config(&database_root.join(CONFIG_FILE_NAME))?,
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `workbase.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Workbase Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at <database>/workbase.toml, or pass --config PATH.
# Relative paths are resolved against the database directory.
# Unknown keys will cause an error.

# Language name for text that comes before any `:: language` marker.
default_language = "default"

# In scattered mode, each work keeps its description.md (and the media it
# references) in this subfolder instead of the work folder itself.
scattered_mode_folder = ".workbase"

# Records the date of the previous build. Media copies older than that
# date are not copied again.
build_metadata_file = ".workbase/build-metadata.json"

# ---------------------------------------------------------------------------
# Media
# ---------------------------------------------------------------------------
[media]
# Directory media files are copied into, as <at>/<work id>/<path>.
at = "media"

# ---------------------------------------------------------------------------
# Color extraction
# ---------------------------------------------------------------------------
[extract_colors]
# Extract up to three dominant colors from raster images.
enabled = true

# ---------------------------------------------------------------------------
# Build lock
# ---------------------------------------------------------------------------
[lock]
# Reclaim a build lock older than this many seconds, assuming the build that
# left it crashed. Omit to never reclaim (remove the lock by hand instead).
# stale_after_secs = 3600
"##
}
