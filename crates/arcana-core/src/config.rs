//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/arcana/config.toml)
//! 3. Environment variables (ARCANA_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::client::ClientConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "ARCANA";

/// Fallback backend endpoint when nothing is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend WebSocket endpoint URL
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// GitHub access token forwarded with workspace selection requests
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            access_token: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ARCANA_ENDPOINT_URL, ARCANA_ACCESS_TOKEN)
    /// 2. Config file (~/.config/arcana/config.toml or ARCANA_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration honoring a CLI-provided config path
    pub fn load_with_cli_override(config_path: Option<&PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the config file as written, without environment overrides
    ///
    /// Use this when editing the file for a save, so exported ARCANA_*
    /// values never get written back into it.
    pub fn load_file(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))
        } else {
            Ok(Self::default())
        }
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
        // ARCANA_ENDPOINT_URL
        if let Ok(val) = std::env::var(format!("{}_ENDPOINT_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.endpoint_url = val;
            }
        }

        // ARCANA_ACCESS_TOKEN
        if let Ok(val) = std::env::var(format!("{}_ACCESS_TOKEN", ENV_PREFIX)) {
            self.access_token = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Save configuration to the default file location
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with the ARCANA_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arcana")
            .join("config.toml")
    }

    /// Connection manager tunables for this configuration
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.endpoint_url)
    }
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT.to_string()
}
