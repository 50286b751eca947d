//! Configuration management for Glance.
//!
//! Handles loading and saving user configuration to platform-standard config directories:
//! - Linux: `~/.config/glance/config.json`
//! - macOS: `~/Library/Application Support/glance/config.json`
//! - Windows: `%APPDATA%\glance\config.json`

use crate::session::ReconfigurePolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Capture-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Preferred preview frame rate.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Automatic restarts allowed after recoverable stream errors.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    /// Delay before each automatic restart, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// What to do when a live frame-rate change fails.
    #[serde(default)]
    pub reconfigure_failure: ReconfigurePolicy,
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            retry_ceiling: default_retry_ceiling(),
            retry_backoff_ms: default_retry_backoff_ms(),
            reconfigure_failure: ReconfigurePolicy::KeepPrevious,
        }
    }
}

/// Source window observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObserverConfig {
    /// How often the source window is probed for focus/title changes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Capture settings group.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Observer settings group.
    #[serde(default)]
    pub observer: ObserverConfig,
}

impl AppConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Get the path to the config file.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs = ProjectDirs::from("", "", "glance").ok_or(ConfigError::NoConfigDir)?;
    Ok(proj_dirs.config_dir().join("config.json"))
}

/// Load configuration from disk.
/// Returns default config if file doesn't exist or is invalid.
pub fn load_config() -> AppConfig {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(e) => {
            warn!("Failed to get config path: {}", e);
            AppConfig::default()
        }
    }
}

/// Load configuration from `path`, falling back to defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        debug!("No config file found, using defaults");
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to parse config file: {}. Using defaults.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

/// Save configuration to disk.
/// Creates the config directory if it doesn't exist.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved config to {:?}", path);
    Ok(())
}
