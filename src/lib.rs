//! `dbconnect` - Open database connections from connection strings
//!
//! The crate exposes one central operation, [`connect`], which turns a
//! connection string into a live PostgreSQL [`Connection`] or fails with a
//! [`ConnectError`]. Named data sources, timeouts and retries are configured
//! on a [`Connector`]; [`blocking::connect`] serves synchronous callers.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), dbconnect::ConnectError> {
//! let conn = dbconnect::connect("Server=localhost;Port=5432;Database=app;UID=app;PWD=secret").await?;
//! conn.ping().await?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod blocking;
/// Command line interface definitions
pub mod cli;
/// Command handlers for the CLI
pub mod commands;
/// Configuration management
pub mod config;
pub mod connection;
pub mod connection_string;
pub mod connector;
pub mod errors;
pub mod retry;

pub use config::{Config, DataSource};
pub use connection::{Connection, ConnectionInfo};
pub use connection_string::ConnectionString;
pub use connector::{ConnectParams, Connector};
pub use errors::{ConnectError, ConnectResult};
pub use retry::{BackoffStrategy, RetryPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Establish a new connection to the database identified by the given
/// connection string
///
/// Uses a default [`Connector`]: no named data sources, a 30 second timeout
/// and a single attempt.
pub async fn connect(connection_string: &str) -> ConnectResult<Connection> {
    Connector::new().connect(connection_string).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_string() {
        let err = connect("   ").await.unwrap_err();
        assert!(matches!(err, ConnectError::InvalidConnectionString { .. }));
    }
}
