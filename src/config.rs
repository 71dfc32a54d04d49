use crate::retry::{BackoffStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default connect timeout when neither the config nor the string sets one
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error occurred while reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error occurred
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but makes no sense
    #[error("Invalid configuration value for {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },
}

/// Main configuration structure, read from `dbconnect.toml`
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Connection defaults
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Retry behaviour for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
    /// Named data sources, looked up through `DSN=<name>`
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSource>,
}

/// Connection defaults
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Timeout for a single connection attempt, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Retry settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How delays grow between attempts
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Randomize delays by up to 10%
    #[serde(default)]
    pub jitter: bool,
}

/// A named data source
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DataSource {
    /// Connection string the name expands to (must not itself use `DSN=`)
    pub connection_string: String,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    /// Free-form description shown by `dbconnect sources`
    #[serde(default)]
    pub description: Option<String>,
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_max_attempts() -> u32 {
    1
}

const fn default_initial_delay_ms() -> u64 {
    100
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            jitter: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Check values that TOML alone cannot reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "connection.connect_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms".to_string(),
                message: "must not exceed retry.max_delay_ms".to_string(),
            });
        }
        for (name, source) in &self.data_sources {
            if source.connection_string.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("data_sources.{name}.connection_string"),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Connect timeout as a [`Duration`]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.connect_timeout_secs)
    }

    /// Build the retry policy described by the `[retry]` section
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_backoff_strategy(self.retry.backoff)
            .with_jitter(self.retry.jitter)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl DataSource {
    /// Create a data source from a connection string
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            password_env: None,
            description: None,
        }
    }

    /// Read the password from `password_env`, if configured
    ///
    /// A configured but unset variable yields `None` with a warning, so the
    /// server gets to decide whether a password was needed.
    #[must_use]
    pub fn password(&self) -> Option<String> {
        let var = self.password_env.as_ref()?;
        debug!("Reading password from environment variable: {}", var);
        env::var(var).map_or_else(
            |_| {
                warn!("Environment variable {} not found, connecting without password", var);
                None
            },
            Some,
        )
    }
}
