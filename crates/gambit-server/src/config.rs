//! Gambit Server Configuration Management
//!
//! Layered configuration loading with figment. Sources, lowest priority first:
//! - Built-in defaults
//! - `gambit.toml` in the working directory
//! - An explicit `--config` file
//! - Environment variables (`GAMBIT_`, nested keys separated by `__`)
//! - Command line overrides

use std::net::SocketAddr;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use gambit_core::RelayConfig;

/// File picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "gambit.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GAMBIT_";

// ----------------------------------------------------------------------------
// Server Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the `gambit` binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAppConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Room lifetime, reaper and move validation settings
    pub relay: RelayConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// WebSocket listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to accept connections on
    pub bind_address: String,

    /// Largest accepted text frame in bytes
    pub max_message_bytes: usize,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
}

/// Values taken from command line flags
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub verbose: bool,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_message_bytes: 64 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl ServerAppConfig {
    /// Load configuration with the standard priority order:
    /// 1. Command line overrides (highest priority)
    /// 2. Environment variables
    /// 3. Explicit configuration file
    /// 4. `gambit.toml` in the working directory
    /// 5. Default values (lowest priority)
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(ConfigError::Loading(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(Self::apply_overrides(figment, overrides))
    }

    fn apply_overrides(mut figment: Figment, overrides: &ConfigOverrides) -> Figment {
        if let Some(bind) = &overrides.bind_address {
            figment = figment.merge(("server.bind_address", bind.clone()));
        }
        if overrides.verbose {
            figment = figment.merge(("logging.level", "debug"));
        }
        figment
    }

    /// Extract and validate a configuration from an assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: ServerAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;

        if self.server.max_message_bytes == 0 {
            return Err(ConfigError::Validation(
                "Maximum message size must be greater than 0".to_string(),
            ));
        }

        self.logging.max_level()?;

        self.relay
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Parsed listener address
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_address.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "Invalid bind address: {}",
                self.server.bind_address
            ))
        })
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let mut example = ServerAppConfig::default();
        example.server.bind_address = "127.0.0.1:3000".to_string();
        example.relay.reaper.notify_members = true;

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

impl LoggingConfig {
    /// Parsed maximum log level
    pub fn max_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Unknown log level: {}", self.level)))
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
