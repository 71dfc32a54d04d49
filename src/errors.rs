//! Error types for connection acquisition
//!
//! Every failure of [`crate::connect`] is reported as a [`ConnectError`].
//! Errors fall into two groups:
//! - Problems with the connection string itself, detected before any I/O
//! - Failures while reaching the server, some of which are worth retrying

use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tracing::{error, warn};

/// The error type returned when a connection cannot be established
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The connection string does not follow the grammar
    #[error("Invalid connection string: {reason}")]
    InvalidConnectionString {
        /// What was wrong with it
        reason: String,
    },

    /// An attribute was present but its value is unusable
    #[error("Invalid value for {key}: {value}")]
    InvalidAttribute {
        /// Canonical attribute name
        key: String,
        /// The rejected value (never a password)
        value: String,
    },

    /// A required attribute is absent
    #[error("Missing required attribute: {key}")]
    MissingAttribute {
        /// Canonical attribute name
        key: String,
    },

    /// `DSN=` named a data source the connector does not know
    #[error("Data source not found: {name}")]
    UnknownDataSource {
        /// The requested data source name
        name: String,
    },

    /// The driver reported a failure (I/O, authentication, protocol)
    ///
    /// The message already carries the driver's cause, so the inner error is
    /// not exposed again through `source()`.
    #[error("Connection failed: {}", driver_detail(.0))]
    Driver(tokio_postgres::Error),

    /// The attempt did not complete within the allowed time
    #[error("Connection timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The blocking runtime could not be created
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ConnectError {
    /// Shorthand for an [`ConnectError::InvalidConnectionString`]
    pub(crate) fn syntax(reason: impl Into<String>) -> Self {
        Self::InvalidConnectionString {
            reason: reason.into(),
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Timeouts, socket-level failures (refused, reset, closed mid-handshake)
    /// and the server saying it cannot accept connections yet are transient.
    /// Authentication failures and client-side configuration errors raised by
    /// the driver are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Driver(e) => match e.as_db_error() {
                Some(db) => {
                    *db.code() == SqlState::CANNOT_CONNECT_NOW
                        || *db.code() == SqlState::TOO_MANY_CONNECTIONS
                }
                None => {
                    e.is_closed() || e.source().is_some_and(|s| s.is::<std::io::Error>())
                }
            },
            _ => false,
        }
    }

    /// Whether the error was detected before any network activity
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConnectionString { .. }
                | Self::InvalidAttribute { .. }
                | Self::MissingAttribute { .. }
                | Self::UnknownDataSource { .. }
        )
    }

    /// Log the error at a level matching its kind
    pub fn log(&self) {
        if self.is_transient() {
            warn!("Transient connection failure: {}", self);
        } else {
            error!("Connection failure: {}", self);
        }
    }

    /// What the user can do about the error, if there is an obvious fix
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidConnectionString { .. } => {
                Some("Expected 'KEY=value;KEY=value' or 'postgresql://...'")
            }
            Self::MissingAttribute { key } if key == "UID" => {
                Some("Add 'UID=<user>' to the connection string")
            }
            Self::UnknownDataSource { .. } => Some("Check [data_sources] in dbconnect.toml"),
            Self::Timeout { .. } => Some("Is the server reachable? Try a larger CONNECTTIMEOUT"),
            _ => None,
        }
    }

    /// The error followed by its hint, for the CLI
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}. {hint}."),
            None => self.to_string(),
        }
    }
}

/// The driver's top-level `Display` is only its kind ("db error"), so dig out
/// the server's message or the underlying cause.
fn driver_detail(error: &tokio_postgres::Error) -> String {
    if let Some(db) = error.as_db_error() {
        return format!(
            "{} {}: {}",
            db.severity(),
            db.code().code(),
            db.message()
        );
    }
    match error.source() {
        Some(cause) => format!("{error}: {cause}"),
        None => error.to_string(),
    }
}

impl From<tokio_postgres::Error> for ConnectError {
    fn from(error: tokio_postgres::Error) -> Self {
        Self::Driver(error)
    }
}

/// Result type alias for connection operations
pub type ConnectResult<T> = std::result::Result<T, ConnectError>;
