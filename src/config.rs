//! Configuration management for chargelink
//!
//! This module handles loading, validation, and management of the client
//! configuration from YAML files.

use crate::error::{ChargelinkError, Result};
use crate::logging::level_filter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Controller endpoint
    pub controller: ControllerConfig,

    /// Connection lifecycle timings and query profile
    pub session: SessionConfig,

    /// In-memory plot and table sizing
    pub series: SeriesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Controller WebSocket endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Host name or IP address of the controller
    pub host: String,

    /// TCP port of the controller's WebSocket listener
    pub port: u16,
}

/// Which set of queries a client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryProfile {
    /// Separate data, mode and schedule queries
    #[default]
    Dashboard,
    /// A single combined `GetJson` query
    Minimal,
}

/// Session manager timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Query profile used for the initial burst and polling
    pub profile: QueryProfile,

    /// Period of the repeating poll while the channel is open
    pub poll_interval_ms: u64,

    /// Delay before reconnecting after a loss
    pub retry_delay_ms: u64,

    /// Upper bound on a single connect attempt
    pub connect_timeout_ms: u64,
}

/// Rolling series and table sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Points kept per metric in the rolling plot buffer
    pub capacity: usize,

    /// Rows kept in the newest-first telemetry table
    pub table_rows: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR, OFF); `RUST_LOG` overrides it
    pub level: String,

    /// Log file, rolled daily with the date appended. Unset disables file output.
    pub file: Option<String>,

    /// Also log to stderr (stdout belongs to the operator console)
    pub console_output: bool,

    /// Emit JSON lines instead of plain text
    pub json_format: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
        }
    }
}

impl ControllerConfig {
    /// WebSocket URL of the controller
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: QueryProfile::Dashboard,
            poll_interval_ms: 5000,
            retry_delay_ms: 5000,
            connect_timeout_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            // one hour at the default poll period
            capacity: 720,
            table_rows: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: Some("/tmp/chargelink.log".to_string()),
            console_output: false,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "chargelink.yaml",
            "/data/chargelink.yaml",
            "/etc/chargelink/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.controller.host.trim().is_empty() {
            return Err(ChargelinkError::validation(
                "controller.host",
                "Host cannot be empty",
            ));
        }

        if self.controller.port == 0 {
            return Err(ChargelinkError::validation(
                "controller.port",
                "Port must be greater than 0",
            ));
        }

        let timings = [
            ("session.poll_interval_ms", self.session.poll_interval_ms),
            ("session.retry_delay_ms", self.session.retry_delay_ms),
            ("session.connect_timeout_ms", self.session.connect_timeout_ms),
        ];
        for (field, value) in timings {
            if value == 0 {
                return Err(ChargelinkError::validation(field, "Must be greater than 0"));
            }
        }

        if self.series.capacity == 0 {
            return Err(ChargelinkError::validation(
                "series.capacity",
                "Must be greater than 0",
            ));
        }

        if self.series.table_rows == 0 {
            return Err(ChargelinkError::validation(
                "series.table_rows",
                "Must be greater than 0",
            ));
        }

        level_filter(&self.logging.level)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.controller.port, 5555);
        assert_eq!(config.session.poll_interval_ms, 5000);
        assert_eq!(config.session.retry_delay_ms, 5000);
        assert_eq!(config.session.profile, QueryProfile::Dashboard);
        assert_eq!(config.series.table_rows, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.controller.host = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.controller.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_controller_url() {
        let c = ControllerConfig {
            host: "10.0.1.177".to_string(),
            port: 5555,
        };
        assert_eq!(c.url(), "ws://10.0.1.177:5555");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "controller:\n  host: charger.local\n  port: 6000\nsession:\n  profile: minimal\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.controller.host, "charger.local");
        assert_eq!(config.session.profile, QueryProfile::Minimal);
        assert_eq!(config.session.retry_delay_ms, 5000);
        assert_eq!(config.series.capacity, 720);
    }
}
