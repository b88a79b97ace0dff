//! Configuration file support for portstatsd
//!
//! Loads and validates exporter configuration from a YAML file.
//! Default location: ./config.yaml
//!
//! ```yaml
//! address: 192.168.0.1
//! username: admin
//! password: admin
//! poll_rate_seconds: 10
//! timeout_seconds: 5
//! ```

use crate::error::{PortstatsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Complete portstatsd configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct PortstatsConfig {
    /// Switch management address (host or host:port)
    #[serde(default)]
    pub address: String,

    /// Web UI username
    #[serde(default)]
    pub username: String,

    /// Web UI password
    #[serde(default)]
    pub password: String,

    /// Expected scrape interval in seconds; informational, the scraper drives polling
    #[serde(default = "default_poll_rate")]
    pub poll_rate_seconds: u64,

    /// Device request timeout in seconds (connect + response)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Metrics listen address
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_poll_rate() -> u64 {
    10
}

fn default_timeout() -> u64 {
    5
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for PortstatsConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            username: String::new(),
            password: String::new(),
            poll_rate_seconds: default_poll_rate(),
            timeout_seconds: default_timeout(),
            listen_address: default_listen_address(),
        }
    }
}

// Keep the password out of logs
impl std::fmt::Debug for PortstatsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortstatsConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("poll_rate_seconds", &self.poll_rate_seconds)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("listen_address", &self.listen_address)
            .finish()
    }
}

impl PortstatsConfig {
    /// Parse configuration from YAML text, applying defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            PortstatsError::Configuration(format!("Failed to parse config: {}", e))
        })?;
        Ok(config.with_defaults())
    }

    /// Load configuration from file. A missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PortstatsError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            PortstatsError::Configuration(msg) => {
                PortstatsError::Configuration(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Zero intervals mean "unset"
    fn with_defaults(mut self) -> Self {
        if self.poll_rate_seconds == 0 {
            self.poll_rate_seconds = default_poll_rate();
        }
        if self.timeout_seconds == 0 {
            self.timeout_seconds = default_timeout();
        }
        self
    }

    /// Device request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Advisory poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_rate_seconds)
    }

    /// Parsed metrics listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            PortstatsError::Configuration(format!(
                "Invalid listen_address {:?}: {}",
                self.listen_address, e
            ))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.address.is_empty() {
            missing.push("address");
        }
        if self.username.is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(PortstatsError::Configuration(format!(
                "Missing required configuration fields: {}",
                missing.join(", ")
            )));
        }

        self.listen_addr()?;

        Ok(())
    }
}
