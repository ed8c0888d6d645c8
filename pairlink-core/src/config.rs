//! Connection manager configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`SessionManager`](crate::SessionManager)
///
/// Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Reconnection attempts allowed before the session is terminated
    pub max_reconnect_attempts: u32,

    /// Delay before each counted reconnection attempt
    pub reconnect_delay_ms: u64,

    /// Delay before reopening the transport after a post-pairing restart
    pub resocket_delay_ms: u64,

    /// Advertised lifetime of a pairing artifact
    pub pairing_ttl_secs: u64,

    /// Shortest identity accepted on authentication
    pub min_identity_len: usize,

    /// Root for per-session credential directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_delay_ms: 3000,
            resocket_delay_ms: 2000,
            pairing_ttl_secs: 60,
            min_identity_len: 8,
            storage_root: None,
        }
    }
}

impl ManagerConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Use a specific credential storage root
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn resocket_delay(&self) -> Duration {
        Duration::from_millis(self.resocket_delay_ms)
    }

    pub fn pairing_ttl(&self) -> Duration {
        Duration::from_secs(self.pairing_ttl_secs)
    }

    /// Resolved credential storage root
    pub fn storage_root(&self) -> PathBuf {
        self.storage_root
            .clone()
            .unwrap_or_else(pairlink_paths::session_root)
    }
}
