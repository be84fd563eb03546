//! Bridge configuration.
//!
//! Stored as JSON in `{config_dir}/bridge.json`. Missing files fall back to
//! defaults; files that exist but cannot be read, parsed or validated are
//! reported as [`ConfigError`] so a corrupt file is never silently replaced.

use crate::error::config::ConfigError;
use crate::mode::ServiceMode;
use crate::transport::framing::DEFAULT_MAX_FRAME_LENGTH;
use crate::{DAEMON_APP_DIR, DAEMON_HOST, DAEMON_PORT};

use common::ErrorLocation;

use std::net::IpAddr;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "bridge.json";
const CONFIG_VERSION: u32 = 1;
const LOCALHOST: &str = "localhost";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_initial_delay_ms")]
    pub connect_initial_delay_ms: u64,
    #[serde(default = "default_connect_max_elapsed_secs")]
    pub connect_max_elapsed_secs: u64,
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_initial_delay_ms: default_connect_initial_delay_ms(),
            connect_max_elapsed_secs: default_connect_max_elapsed_secs(),
            max_frame_length: default_max_frame_length(),
        }
    }
}

impl LinkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.connect_initial_delay_ms)
    }

    pub fn connect_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.connect_max_elapsed_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    /// Mode shown before the daemon has reported its status.
    #[serde(default)]
    pub preferred_mode: Option<ServiceMode>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            link: LinkConfig::default(),
            commands: CommandConfig::default(),
            preferred_mode: None,
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_host() -> String {
    DAEMON_HOST.to_string()
}
fn default_port() -> u16 {
    DAEMON_PORT
}
fn default_connect_initial_delay_ms() -> u64 {
    100
}
fn default_connect_max_elapsed_secs() -> u64 {
    10
}
fn default_max_frame_length() -> usize {
    DEFAULT_MAX_FRAME_LENGTH
}
fn default_timeout_secs() -> u64 {
    5
}

/// `{platform config dir}/perpetua`.
#[track_caller]
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(DAEMON_APP_DIR))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
        })
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Load config from {config_dir}/bridge.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(BridgeConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/bridge.json using temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        // The daemon socket is never exposed beyond this machine
        let loopback = self.link.host == LOCALHOST
            || self
                .link
                .host
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_loopback());
        if !loopback {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Daemon host must be loopback, got '{}'", self.link.host),
            });
        }

        if self.link.port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Daemon port cannot be 0".to_string(),
            });
        }

        if self.link.connect_max_elapsed_secs == 0 || self.commands.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Timeouts must be at least 1 second".to_string(),
            });
        }

        if self.link.max_frame_length == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "max_frame_length cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}
