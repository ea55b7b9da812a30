//! Configuration file for the gatelink host.

use gatelink_core::DEFAULT_PORT;
use gatelink_transport::NetworkConfig;
use gatelink_transport::address::{DEFAULT_CONNECT_HOST, make_socket_address};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// gatelink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Remote servers to link with
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One configured remote server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique display name
    pub name: String,
    /// Connect address (`host[:port]`)
    pub address: String,
    /// Key the remote server uses as its own network key
    pub key: String,
    /// Whether to link with this server
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("gatelink.toml")
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.network.validate()?;

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                anyhow::bail!("Server name must not be empty");
            }
            if !names.insert(server.name.to_lowercase()) {
                anyhow::bail!("Duplicate server name: {}", server.name);
            }
            if server.key.is_empty() {
                anyhow::bail!("Server '{}' has no key", server.name);
            }
            make_socket_address(Some(&server.address), DEFAULT_CONNECT_HOST, DEFAULT_PORT, false)
                .map_err(|e| anyhow::anyhow!("Server '{}' address: {}", server.name, e))?;
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}
