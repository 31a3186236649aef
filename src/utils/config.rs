use crate::core::{
    DEFAULT_BAUD_RATE, DEFAULT_PERIOD_S, DEFAULT_PORT, DEFAULT_REMOTE_ADDRESS,
    DEFAULT_SYNC_TIMEOUT_MS,
};
use crate::hardware::LinkSettings;
use crate::xbee::ApiMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Sender configuration, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Serial endpoint of the local module
    pub port: String,
    /// Serial speed in baud
    pub baud_rate: u32,
    /// Remote module address as hex, parsed when the peer is resolved
    pub remote_address: String,
    /// Seconds to wait between sends
    pub period_s: u64,
    /// Accepted for compatibility, has no effect on sending
    pub broadcast: bool,
    /// Framing used until the module reports its own mode
    pub api_mode: ApiMode,
    /// Milliseconds to wait for a transmit status
    pub sync_timeout_ms: u64,
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {parameter} = {value}")]
    Invalid { parameter: String, value: String },
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            remote_address: DEFAULT_REMOTE_ADDRESS.to_string(),
            period_s: DEFAULT_PERIOD_S,
            broadcast: false,
            api_mode: ApiMode::Api,
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
        }
    }
}

impl SenderConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SenderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values that cannot open a port or bound a send.
    /// The remote address is checked when the peer is resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid {
                parameter: "port".to_string(),
                value: format!("{:?}", self.port),
            });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid {
                parameter: "baud_rate".to_string(),
                value: self.baud_rate.to_string(),
            });
        }
        if self.sync_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                parameter: "sync_timeout_ms".to_string(),
                value: self.sync_timeout_ms.to_string(),
            });
        }
        Ok(())
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::new(&self.port, self.baud_rate)
    }
}
