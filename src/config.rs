//! Configuration system for the TaskBridge worker
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TASKBRIDGE_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker identity and task settings
    pub worker: WorkerSettings,

    /// Task manager connection settings
    pub manager: ManagerSettings,

    /// Stateful task RPC server settings
    pub server: ServerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Worker identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Task id sent at handshake (usually supplied on the command line)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,

    /// Package locations prepared at startup, before any submission
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Task manager connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Task manager host
    pub host: String,

    /// Task manager port
    pub port: u16,

    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// RPC server listen settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen host
    pub host: String,

    /// Listen port (0 = auto-assign)
    pub port: u16,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker: WorkerSettings::default(),
            manager: ManagerSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            task_id: None,
            packages: vec![],
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21000,
            heartbeat_interval_secs: 3,
            connect_timeout_secs: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21010,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            config = toml::from_str(&content)
                .map_err(|e| Error::config_parse(e.to_string()))?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::config_not_found(path));
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("taskbridge-worker.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("taskbridge").join("worker.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".taskbridge").join("worker.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/taskbridge/worker.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Worker settings
        if let Ok(val) = std::env::var("TASKBRIDGE_TASK_ID") {
            if let Ok(n) = val.parse() {
                self.worker.task_id = Some(n);
            }
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_PACKAGES") {
            self.worker.packages = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        // Manager settings
        if let Ok(val) = std::env::var("TASKBRIDGE_MANAGER_HOST") {
            self.manager.host = val;
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_MANAGER_PORT") {
            if let Ok(n) = val.parse() {
                self.manager.port = n;
            }
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_HEARTBEAT_INTERVAL_SECS") {
            if let Ok(n) = val.parse() {
                self.manager.heartbeat_interval_secs = n;
            }
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_CONNECT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.manager.connect_timeout_secs = n;
            }
        }

        // Server settings
        if let Ok(val) = std::env::var("TASKBRIDGE_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_SERVER_PORT") {
            if let Ok(n) = val.parse() {
                self.server.port = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("TASKBRIDGE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("TASKBRIDGE_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.worker.packages = self
            .worker
            .packages
            .iter()
            .map(|p| expand_path(p))
            .collect();

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.manager.host.is_empty() {
            return Err(Error::config_field_invalid(
                "manager.host",
                "manager host cannot be empty",
            ));
        }
        if self.manager.port == 0 {
            return Err(Error::config_field_invalid(
                "manager.port",
                "manager port cannot be 0",
            ));
        }
        if self.manager.heartbeat_interval_secs == 0 {
            return Err(Error::config_field_invalid(
                "manager.heartbeat_interval_secs",
                "heartbeat interval must be at least 1 second",
            ));
        }
        if self.manager.connect_timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "manager.connect_timeout_secs",
                "connect timeout must be at least 1 second",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Task manager address in `host:port` form
    pub fn manager_addr(&self) -> String {
        format!("{}:{}", self.manager.host, self.manager.port)
    }

    /// RPC server listen address in `host:port` form
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Heartbeat interval as a Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.manager.heartbeat_interval_secs)
    }

    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.manager.connect_timeout_secs)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".taskbridge")
                .join("worker.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    // Generate default config with comments
    let config_content = generate_default_config();

    // Write the file
    fs::write(&config_path, config_content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# TaskBridge Worker Configuration

[worker]
# Task id sent at handshake (usually supplied on the command line)
# task_id = 1

# Package locations prepared at startup, before any submission
packages = []

[manager]
# Task manager host
host = "127.0.0.1"

# Task manager port
port = 21000

# Heartbeat interval in seconds
heartbeat_interval_secs = 3

# Connection timeout in seconds
connect_timeout_secs = 30

[server]
# RPC server listen host
host = "127.0.0.1"

# RPC server listen port (0 = auto-assign)
port = 21010

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.taskbridge/logs/worker.log"

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.manager.host, "127.0.0.1");
        assert_eq!(config.manager.port, 21000);
        assert_eq!(config.manager.heartbeat_interval_secs, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override() {
        // Set env vars
        env::set_var("TASKBRIDGE_MANAGER_HOST", "manager.example.com");
        env::set_var("TASKBRIDGE_MANAGER_PORT", "22000");
        env::set_var("TASKBRIDGE_LOG_LEVEL", "debug");

        let mut config = WorkerConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.manager.host, "manager.example.com");
        assert_eq!(config.manager.port, 22000);
        assert_eq!(config.logging.level, "debug");

        // Cleanup
        env::remove_var("TASKBRIDGE_MANAGER_HOST");
        env::remove_var("TASKBRIDGE_MANAGER_PORT");
        env::remove_var("TASKBRIDGE_LOG_LEVEL");
    }

    #[test]
    fn test_validation_empty_host() {
        let mut config = WorkerConfig::default();
        config.manager.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_heartbeat() {
        let mut config = WorkerConfig::default();
        config.manager.heartbeat_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = WorkerConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = WorkerConfig::default();
        config.worker.packages = vec!["~/tasks/pkg".to_string()];
        config.expand_paths();

        // Should not contain ~
        assert!(!config.worker.packages[0].contains('~'));
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = WorkerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: WorkerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.manager.host, parsed.manager.host);
        assert_eq!(config.manager.port, parsed.manager.port);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[worker]
task_id = 42
packages = ["/opt/tasks"]

[manager]
host = "manager.internal"
port = 9100
heartbeat_interval_secs = 5

[logging]
level = "debug"
"#;

        let config: WorkerConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.worker.task_id, Some(42));
        assert_eq!(config.worker.packages, vec!["/opt/tasks"]);
        assert_eq!(config.manager.host, "manager.internal");
        assert_eq!(config.manager.port, 9100);
        assert_eq!(config.manager.heartbeat_interval_secs, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_addr_helpers() {
        let config = WorkerConfig::default();
        assert_eq!(config.manager_addr(), "127.0.0.1:21000");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(3));
    }
}
