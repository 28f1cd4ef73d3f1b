//! Configuration system for the ferry CLI.

use ferry_core::DEFAULT_RELAY_ADDR;
use ferry_transport::DEFAULT_LOCAL_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Ferry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Receive configuration
    #[serde(default)]
    pub receive: ReceiveConfig,
    /// Local-network configuration
    #[serde(default)]
    pub local: LocalConfig,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay address used when no --relay flag is given
    #[serde(default = "default_relay_address")]
    pub address: String,
}

/// Receive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveConfig {
    /// Directory received files are written under
    #[serde(default = "default_out_path")]
    pub out_path: PathBuf,
}

/// Local-network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Port for direct transfers on the LAN
    #[serde(default = "default_local_port")]
    pub port: u16,
}

fn default_relay_address() -> String {
    DEFAULT_RELAY_ADDR.to_string()
}

fn default_out_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_local_port() -> u16 {
    DEFAULT_LOCAL_PORT
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: default_relay_address(),
        }
    }
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            out_path: default_out_path(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            port: default_local_port(),
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
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("ferry/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.relay.address.contains(':') {
            anyhow::bail!("relay address must be host:port, got {}", self.relay.address);
        }
        if self.local.port == 0 {
            anyhow::bail!("local port must be non-zero");
        }
        Ok(())
    }
}
