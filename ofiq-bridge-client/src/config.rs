//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via OFIQ_BRIDGE_CONFIG)
//! 3. Environment variables

use ofiq_bridge_protocol::DEFAULT_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// ZeroMQ endpoint the engine binds to.
    pub endpoint: String,
    /// OFIQ installation root, or the engine executable itself.
    pub engine_path: Option<PathBuf>,
    /// How long a liveness probe waits for its PING reply.
    pub probe_timeout_ms: u64,
    /// Upper bound on connecting a fresh channel.
    pub connect_timeout_ms: u64,
    /// Delay between connect attempts.
    pub connect_retry_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            engine_path: None,
            probe_timeout_ms: 1000,
            connect_timeout_ms: 60_000,
            connect_retry_ms: 100,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointing at an engine installation.
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: Some(engine_path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("OFIQ_BRIDGE_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("OFIQ_BRIDGE_ENDPOINT") {
            if !endpoint.is_empty() {
                self.endpoint = endpoint;
            }
        }

        if let Ok(path) = std::env::var("OFIQ_BRIDGE_ENGINE_PATH") {
            self.engine_path = Some(PathBuf::from(path));
        }

        if let Ok(ms) = std::env::var("OFIQ_BRIDGE_PROBE_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.probe_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("OFIQ_BRIDGE_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.connect_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("OFIQ_BRIDGE_CONNECT_RETRY_MS") {
            if let Ok(ms) = ms.parse() {
                self.connect_retry_ms = ms;
            }
        }
    }

    /// Checks values that would make the client unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
    MissingEnginePath,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
            ConfigError::MissingEnginePath => {
                write!(f, "engine_path is not set (OFIQ_BRIDGE_ENGINE_PATH)")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}
