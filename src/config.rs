//! Settings file and per-start server configuration.
//!
//! Settings live at:
//! - Linux: ~/.config/genesys-devserver/config.toml
//! - macOS: ~/Library/Application Support/genesys-devserver/config.toml
//! - Windows: %APPDATA%\genesys-devserver\config.toml
//!
//! A missing file yields defaults. CLI flags override individual values.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FileServerError;
use crate::fs_utils;
use crate::Result;

pub const DEFAULT_PORT: u16 = 4000;

/// Settings for the dev server
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub listing: ListingSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub build: BuildSettings,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Bind address; must be a loopback address
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long `stop` waits for open connections before terminating them
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Request body limit for writes and uploads
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_drain_timeout_ms() -> u64 {
    1000
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            drain_timeout_ms: default_drain_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerSettings {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Directory listing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingSettings {
    /// File names never reported by listings
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,

    /// Maximum recursion depth for recursive listings
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_ignored_files() -> Vec<String> {
    vec![".DS_Store".to_string()]
}

fn default_max_depth() -> usize {
    99
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            ignored_files: default_ignored_files(),
            max_depth: default_max_depth(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Entries kept for `GET /api/logs`
    #[serde(default = "default_history")]
    pub history: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_history() -> usize {
    500
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            history: default_history(),
        }
    }
}

/// Project build settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSettings {
    /// Program used to launch esbuild
    #[serde(default = "default_bundler")]
    pub bundler: String,
}

fn default_bundler() -> String {
    "npx".to_string()
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            bundler: default_bundler(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("genesys-devserver").join("config.toml"))
    }

    /// Load settings from the default path
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content).map_err(|e| {
            FileServerError::invalid_config(format!(
                "Failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            FileServerError::invalid_config(format!("Failed to serialize settings: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // The exec endpoint runs arbitrary commands; never expose it beyond this machine.
        if !self.server.host.is_loopback() {
            return Err(FileServerError::invalid_config(format!(
                "host must be a loopback address, got {}",
                self.server.host
            )));
        }
        Ok(())
    }
}

/// Port and root directory for one running instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    port: u16,
    root_directory: PathBuf,
}

impl ServerConfig {
    /// Validate and canonicalize a start request
    pub fn new(port: u16, root_directory: impl AsRef<Path>) -> Result<Self> {
        let root = root_directory.as_ref();
        if port == 0 {
            return Err(FileServerError::invalid_config("port must be greater than 0"));
        }
        if !root.exists() {
            return Err(FileServerError::invalid_config(format!(
                "root directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(FileServerError::invalid_config(format!(
                "root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            port,
            root_directory: fs_utils::canonicalize(root)?,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }
}
