//! Configuration loading
//!
//! Bootstrap configuration is read from a TOML file. Resolution order for the
//! file itself:
//! 1. Explicit path (command-line argument or `VTEL_CONFIG`)
//! 2. `~/.config/vtel/config.toml`
//! 3. `/etc/vtel/config.toml`
//! 4. Compiled defaults (no file)
//!
//! A missing file is not an error; every field has a built-in default.
//! Command-line and environment overrides are applied on top by the binary.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VTEL_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Live engine tuning
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineSection {
    /// Maximum number of sessions retained (FIFO eviction beyond this)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Throttled dispatch interval
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Delay before reconnecting an uncleanly closed stream
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// EventBus buffer size
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Upstream analytics service addresses
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UpstreamSection {
    /// Base URL for the SSE result and live-data streams
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,

    /// Base URL for the frame WebSocket
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
}

/// HTTP server bind settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_capacity() -> usize {
    4
}

fn default_flush_interval_ms() -> u64 {
    500
}

fn default_reconnect_backoff_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    100
}

fn default_http_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_ws_base_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5750
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            http_base_url: default_http_base_url(),
            ws_base_url: default_ws_base_url(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration
    ///
    /// An explicit path that does not exist is an error. When no explicit path
    /// is given and no default location has a file, compiled defaults are used.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading configuration from {} ({})", path.display(), CONFIG_ENV_VAR);
            return Self::load_from(&path);
        }

        match default_config_path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.capacity == 0 {
            return Err(Error::Config("engine.capacity must be at least 1".to_string()));
        }
        if self.engine.flush_interval_ms == 0 {
            return Err(Error::Config(
                "engine.flush_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.engine.reconnect_backoff_ms == 0 {
            return Err(Error::Config(
                "engine.reconnect_backoff_ms must be at least 1".to_string(),
            ));
        }
        if self.engine.event_capacity == 0 {
            return Err(Error::Config(
                "engine.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// First existing config file among the platform default locations
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vtel").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/vtel/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.engine.capacity, 4);
        assert_eq!(config.engine.flush_interval_ms, 500);
        assert_eq!(config.engine.reconnect_backoff_ms, 2000);
        assert_eq!(config.upstream.http_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.port, 5750);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [engine]
            capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.capacity, 8);
        assert_eq!(config.engine.flush_interval_ms, 500);
        assert_eq!(config.upstream, UpstreamSection::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = TomlConfig::from_toml_str("[engine]\ncapacity = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = TomlConfig::from_toml_str("[engine\ncapacity = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
