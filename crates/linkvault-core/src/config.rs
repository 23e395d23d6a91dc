//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/linkvault/config.toml)
//! 3. Environment variables (LINKVAULT_* prefix)
//!
//! Environment variables take precedence over config file values.
//! Per-vault settings (lock timeout, open command, ...) are stored inside the
//! encrypted vault, not here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::image_cache::cache_dir_for;

/// Environment variable prefix
const ENV_PREFIX: &str = "LINKVAULT";

/// Vault file used when none is named
const DEFAULT_VAULT: &str = "links.linkvault";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding vault files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Vault file name used when the CLI is not given one
    #[serde(default = "default_vault")]
    pub default_vault: String,

    /// Log file path (defaults to `{data_dir}/debug.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// HTTP timeout for thumbnails and page metadata
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Session tick period
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_vault: default_vault(),
            log_file: None,
            fetch_timeout_secs: default_fetch_timeout(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LINKVAULT_DATA_DIR, LINKVAULT_VAULT, LINKVAULT_FETCH_TIMEOUT)
    /// 2. Config file (~/.config/linkvault/config.toml or LINKVAULT_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_VAULT", ENV_PREFIX)) {
            if !val.is_empty() {
                self.default_vault = val;
            }
        }

        // Unparseable values are ignored
        if let Ok(val) = std::env::var(format!("{}_FETCH_TIMEOUT", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.fetch_timeout_secs = secs;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LINKVAULT_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkvault")
            .join("config.toml")
    }

    /// Resolve a vault name to a path
    ///
    /// Names containing a path separator are used as given; bare names live
    /// in `data_dir`. `None` means the default vault.
    pub fn vault_path(&self, name: Option<&str>) -> PathBuf {
        let name = name.unwrap_or(&self.default_vault);
        let candidate = Path::new(name);
        if candidate.is_absolute() || candidate.components().count() > 1 {
            candidate.to_path_buf()
        } else {
            self.data_dir.join(candidate)
        }
    }

    /// Thumbnail cache directory for a vault
    pub fn cache_dir_for(&self, vault_path: &Path) -> PathBuf {
        cache_dir_for(vault_path)
    }

    /// Log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkvault")
}

fn default_vault() -> String {
    DEFAULT_VAULT.to_string()
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT
}

fn default_tick_millis() -> u64 {
    1000
}
