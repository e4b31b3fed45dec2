//! Configuration management for the filedeck server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filedeck/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind must be a socket address like 127.0.0.1:3000, got {0}")]
    InvalidBind(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("retention_secs must be greater than 0, got {0}")]
    InvalidRetention(u64),

    #[error("reap_interval_secs must be greater than 0, got {0}")]
    InvalidReapInterval(u64),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the filedeck server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener and logging.
    pub server: ServerConfig,

    /// Managed directory tree.
    pub files: FilesConfig,

    /// Archive scratch area.
    pub archive: ArchiveConfig,

    /// Admin credential and sessions.
    pub auth: AuthConfig,
}

/// Listener and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: String,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Managed directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Root directory. Empty means the default root.
    pub root_path: PathBuf,

    /// List dotfiles.
    pub include_hidden: bool,

    /// Maximum size of one uploaded file in bytes (default: 100MB).
    pub max_upload_size: u64,
}

/// Archive scratch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Where archives are built. Empty means `<tmp>/filedeck-archives`.
    pub scratch_dir: PathBuf,

    /// Age in seconds after which a leftover archive is removed.
    pub retention_secs: u64,

    /// Seconds between reaper sweeps.
    pub reap_interval_secs: u64,
}

/// Admin credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Admin user name.
    pub username: String,

    /// Hex SHA-256 of salt and password. Empty means no credential yet.
    pub password_hash: String,

    /// Hex salt used for `password_hash`.
    pub password_salt: String,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::new(),
            include_hidden: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::new(),
            retention_secs: 3600,    // 1 hour
            reap_interval_secs: 300, // 5 minutes
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
            session_ttl_secs: 7 * 24 * 60 * 60, // 1 week
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedeck")
        .join("config.toml")
}

/// Returns the default root directory.
pub fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedeck")
        .join("root")
}

impl FilesConfig {
    /// Configured root, or `None` for the default.
    pub fn configured_root(&self) -> Option<PathBuf> {
        if self.root_path.as_os_str().is_empty() {
            None
        } else {
            Some(self.root_path.clone())
        }
    }
}

impl ArchiveConfig {
    /// Effective scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        if self.scratch_dir.as_os_str().is_empty() {
            std::env::temp_dir().join("filedeck-archives")
        } else {
            self.scratch_dir.clone()
        }
    }

    /// Retention as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Reaper interval as a duration.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl AuthConfig {
    /// Whether an admin password has been set.
    pub fn has_credential(&self) -> bool {
        !self.password_hash.is_empty()
    }

    /// Session lifetime as a duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEDECK_ROOT: Override the root directory
    /// - FILEDECK_BIND: Override the listen address
    /// - FILEDECK_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("FILEDECK_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root_path from environment: {}", root);
                self.files.root_path = PathBuf::from(root);
            }
        }

        if let Ok(bind) = std::env::var("FILEDECK_BIND") {
            if !bind.is_empty() {
                tracing::info!("Overriding bind from environment: {}", bind);
                self.server.bind = bind;
            }
        }

        if let Ok(level) = std::env::var("FILEDECK_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidBind(self.server.bind.clone()));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        if self.files.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(self.files.max_upload_size));
        }

        if self.archive.retention_secs == 0 {
            return Err(ConfigError::InvalidRetention(self.archive.retention_secs));
        }

        if self.archive.reap_interval_secs == 0 {
            return Err(ConfigError::InvalidReapInterval(
                self.archive.reap_interval_secs,
            ));
        }

        Ok(())
    }

    /// Parsed listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind))
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/filedeck/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist. The file is written
    /// to a sibling and renamed so a crash never leaves a truncated config.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let contents = self.to_toml()?;
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write config file: {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
