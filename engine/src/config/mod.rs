//! Configuration management
//!
//! This module handles loading, validation, and management of the Atrium
//! configuration. Configuration is stored in TOML format at
//! ~/.atrium/config.toml.
//!
//! # Configuration Sections
//!
//! - **server**: Bind address, port, dev console flag, log level
//! - **storage**: Site document backend (memory or local file), encryption
//! - **security**: Session signing key and site encryption key (hex)
//! - **plugins**: Trusted plugin names
//!
//! # Path Expansion
//!
//! Paths in the storage section support ~ expansion to the user's home
//! directory. The site document's parent directory is created lazily on
//! first save, so a fresh path is valid configuration.

use sdk::SiteError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Every section is optional in the file; missing sections take their
/// defaults so a partial config (or none at all) still boots.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Site document storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key material
    #[serde(default)]
    pub security: SecurityConfig,

    /// Trusted plugin configuration
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Expose the unauthenticated dev console endpoints
    #[serde(default)]
    pub dev_console: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_console: false,
            log_level: default_log_level(),
        }
    }
}

/// Site document backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-memory only; everything is lost on shutdown
    Memory,
    /// JSON document on the local filesystem
    Local,
}

/// Site document storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default = "default_storage_kind")]
    pub kind: StorageKind,

    /// Site document path for the local backend (supports ~ expansion)
    #[serde(default = "default_site_path")]
    pub path: PathBuf,

    /// Encrypt the site document at rest (requires security.site_key)
    #[serde(default)]
    pub encrypt: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: default_storage_kind(),
            path: default_site_path(),
            encrypt: false,
        }
    }
}

/// Key material configuration
///
/// Both keys are 32 bytes, hex encoded. An empty session key means a fresh
/// key is generated at each boot (sessions do not survive restarts). An
/// empty site key is an error when storage encryption is on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// Session cookie signing key (64 hex characters)
    #[serde(default)]
    pub session_key: String,

    /// Site document encryption key (64 hex characters)
    #[serde(default)]
    pub site_key: String,
}

/// Trusted plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin names enabled and fully granted at boot
    #[serde(default = "default_trusted")]
    pub trusted: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            trusted: default_trusted(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_site_path() -> PathBuf {
    PathBuf::from("~/.atrium/site.json")
}

fn default_trusted() -> Vec<String> {
    vec![
        "cookiesession".to_string(),
        "htmlengine".to_string(),
        "pathrouter".to_string(),
        "welcome".to_string(),
    ]
}

impl Config {
    /// Load configuration from the default location (~/.atrium/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration on disk and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, TOML parsing
    /// fails, or validation fails.
    pub fn load_or_create() -> Result<Self, SiteError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load_from_path(path: &Path) -> Result<Self, SiteError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SiteError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| SiteError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, SiteError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SiteError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| SiteError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| SiteError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.atrium/config.toml)
    pub fn default_config_path() -> Result<PathBuf, SiteError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SiteError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".atrium").join("config.toml"))
    }

    /// The session signing key, if one is configured.
    pub fn session_key(&self) -> Result<Option<[u8; 32]>, SiteError> {
        parse_key_hex(&self.security.session_key, "session_key")
    }

    /// The site encryption key, if one is configured.
    pub fn site_key(&self) -> Result<Option<[u8; 32]>, SiteError> {
        parse_key_hex(&self.security.site_key, "site_key")
    }

    /// Validate and process configuration
    ///
    /// Checks the log level, verifies key material decodes, requires a site
    /// key when encryption is on, and expands ~ in the storage path.
    fn validate_and_process(&mut self) -> Result<(), SiteError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.server.log_level.as_str()) {
            return Err(SiteError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.server.log_level,
                valid_log_levels.join(", ")
            )));
        }

        self.session_key()?;
        let site_key = self.site_key()?;
        if self.storage.encrypt && site_key.is_none() {
            return Err(SiteError::Config(
                "storage.encrypt requires security.site_key".to_string(),
            ));
        }

        self.storage.path = expand_path(&self.storage.path)?;

        Ok(())
    }
}

/// Decode a 32-byte hex key, treating the empty string as absent.
pub fn parse_key_hex(value: &str, name: &str) -> Result<Option<[u8; 32]>, SiteError> {
    if value.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(value)
        .map_err(|e| SiteError::Config(format!("security.{} is not valid hex: {}", name, e)))?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SiteError::Config(format!("security.{} must be 64 hex characters", name)))?;
    Ok(Some(key))
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, SiteError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| SiteError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SiteError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| SiteError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
