//! Configuration for sehhat-registry

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sehhat-registry")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the registry database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum rows returned by a single list query
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Seconds a cached analytics snapshot stays fresh before recompute
    #[serde(default = "default_analytics_ttl")]
    pub analytics_ttl_secs: u64,

    /// Seed an admin principal with this id on first start (empty = none)
    #[serde(default)]
    pub bootstrap_admin_id: String,
}

fn default_http_port() -> u16 {
    8094
}

fn default_max_page_size() -> u32 {
    500
}

fn default_analytics_ttl() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            max_page_size: default_max_page_size(),
            analytics_ttl_secs: default_analytics_ttl(),
            bootstrap_admin_id: String::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get registry database path
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("registry.db")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}
