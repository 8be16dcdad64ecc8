//! Shell configuration persistence
//!
//! Stores the signed-in principal, data directory and guard timings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use applock_core::config::{DEFAULT_CHECK_INTERVAL, DEFAULT_LOCK_AFTER};
use applock_core::GuardConfig;
use serde::{Deserialize, Serialize};

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Directory under the user config/data dirs
const APP_DIR_NAME: &str = "applock";

/// Shell configuration that persists across runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellConfig {
    /// Principal id handed over by the identity provider
    #[serde(default)]
    pub principal: Option<String>,

    /// Where credentials and local state are kept
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between idle checks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Idle budget used until one is set with `timeout`
    #[serde(default = "default_lock_after_minutes")]
    pub default_lock_after_minutes: u64,

    /// Seconds before the idle lock at which a warning is printed
    #[serde(default = "default_warning_secs")]
    pub warning_secs: u64,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_secs()
}

fn default_lock_after_minutes() -> u64 {
    DEFAULT_LOCK_AFTER.as_secs() / 60
}

fn default_warning_secs() -> u64 {
    60
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            principal: None,
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval_secs(),
            default_lock_after_minutes: default_lock_after_minutes(),
            warning_secs: default_warning_secs(),
        }
    }
}

impl ShellConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg_config).join(APP_DIR_NAME));
        }

        dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
    }

    /// Get the default config file path
    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, contents).map_err(|e| ConfigError::Io(e.to_string()))?;

        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Guard timings derived from this config
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            check_interval: Duration::from_secs(self.check_interval_secs.max(1)),
            default_lock_after: Duration::from_secs(
                self.default_lock_after_minutes.max(1).saturating_mul(60),
            ),
            warning_period: Duration::from_secs(self.warning_secs),
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    pub fn local_state_path(&self) -> PathBuf {
        self.data_dir.join("local.json")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}
