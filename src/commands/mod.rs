use crate::config::Config;
use crate::errors::ConnectError;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Check command functionality
pub mod check;
/// Parse command functionality
pub mod parse;
/// Sources command functionality
pub mod sources;

/// Config file looked up in the current directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "dbconnect.toml";

/// Load the configuration for a command
///
/// An explicit path must exist. Without one, `dbconnect.toml` in the current
/// directory is used when present, and defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}")),
        None => {
            debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            Ok(Config::default())
        }
    }
}

/// Turn a connection error into a command error, hint first
///
/// The [`ConnectError`] stays the root cause so `{:#}` prints the full text.
pub(crate) fn connect_failure(error: ConnectError) -> anyhow::Error {
    match error.hint() {
        Some(hint) => anyhow::Error::new(error).context(hint),
        None => anyhow::Error::new(error),
    }
}
