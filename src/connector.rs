//! # Connector
//!
//! Resolves a connection string into driver settings and opens the
//! connection:
//!
//! 1. Parse the string ([`ConnectionString`])
//! 2. Expand `DSN=<name>` from the registered data sources, letting the
//!    caller's own attributes override the registered ones
//! 3. Validate the attributes into [`ConnectParams`]
//! 4. Connect under a timeout, retrying transient failures per the policy
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dbconnect::{Connector, DataSource};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Connector::new()
//!     .with_data_source("local", DataSource::new("Server=localhost;Database=app"))
//!     .with_connect_timeout(Duration::from_secs(5));
//!
//! let conn = connector.connect("DSN=local;UID=postgres").await?;
//! conn.ping().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{Config, DataSource, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::connection::{Connection, ConnectionInfo};
use crate::connection_string::{
    ConnectionString, APPLICATION_NAME, CONNECT_TIMEOUT, DATABASE, DSN, PORT, PWD, SERVER,
    SSL_MODE, UID,
};
use crate::errors::{ConnectError, ConnectResult};
use crate::retry::RetryPolicy;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Host used when the string names none
pub const DEFAULT_HOST: &str = "localhost";
/// Port used when the string names none
pub const DEFAULT_PORT: u16 = 5432;

const KNOWN_KEYS: [&str; 9] = [
    DSN,
    SERVER,
    PORT,
    DATABASE,
    UID,
    PWD,
    APPLICATION_NAME,
    CONNECT_TIMEOUT,
    SSL_MODE,
];

/// Validated settings for one connection attempt
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: Option<String>,
    /// User name
    pub user: String,
    password: Option<String>,
    /// Application name reported to the server
    pub application_name: Option<String>,
    /// Per-string timeout override
    pub connect_timeout: Option<Duration>,
    /// Transport security mode
    pub ssl_mode: SslMode,
}

impl ConnectParams {
    /// Validate resolved attributes
    ///
    /// `DSN` must already have been expanded.
    pub fn from_attributes(attributes: &ConnectionString) -> ConnectResult<Self> {
        for (key, _) in attributes.iter() {
            if !KNOWN_KEYS.contains(&key) {
                debug!("Ignoring unrecognized connection string attribute: {}", key);
            }
        }

        let host = attributes.get(SERVER).unwrap_or(DEFAULT_HOST);
        if host.is_empty() {
            return Err(invalid(SERVER, host));
        }

        let port = match attributes.get(PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|&p| p != 0)
                .ok_or_else(|| invalid(PORT, raw))?,
            None => DEFAULT_PORT,
        };

        let user = attributes
            .get(UID)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConnectError::MissingAttribute {
                key: UID.to_string(),
            })?;

        let connect_timeout = attributes
            .get(CONNECT_TIMEOUT)
            .map(|raw| {
                raw.parse::<u64>()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid(CONNECT_TIMEOUT, raw))
            })
            .transpose()?;

        let ssl_mode = match attributes.get(SSL_MODE) {
            None => SslMode::Prefer,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "disable" => SslMode::Disable,
                "prefer" => SslMode::Prefer,
                _ => return Err(invalid(SSL_MODE, raw)),
            },
        };

        Ok(Self {
            host: host.to_string(),
            port,
            database: attributes
                .get(DATABASE)
                .filter(|d| !d.is_empty())
                .map(String::from),
            user: user.to_string(),
            password: attributes.password().map(String::from),
            application_name: attributes.get(APPLICATION_NAME).map(String::from),
            connect_timeout,
            ssl_mode,
        })
    }

    /// Whether a password will be sent
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Build the driver configuration
    #[must_use]
    pub fn driver_config(&self, timeout: Duration) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .ssl_mode(self.ssl_mode)
            .connect_timeout(timeout);
        if let Some(database) = &self.database {
            config.dbname(database);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(application_name) = &self.application_name {
            config.application_name(application_name);
        }
        config
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

fn invalid(key: &str, value: &str) -> ConnectError {
    ConnectError::InvalidAttribute {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Opens connections from connection strings
#[derive(Debug, Clone)]
pub struct Connector {
    data_sources: BTreeMap<String, DataSource>,
    connect_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            data_sources: BTreeMap::new(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            retry_policy: RetryPolicy::none(),
        }
    }
}

impl Connector {
    /// A connector with no data sources, a 30 second timeout and no retries
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector set up from a loaded configuration file
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_sources: config.data_sources.clone(),
            connect_timeout: config.connect_timeout(),
            retry_policy: config.retry_policy(),
        }
    }

    /// Register a named data source
    #[must_use]
    pub fn with_data_source(mut self, name: impl Into<String>, source: DataSource) -> Self {
        self.data_sources.insert(name.into(), source);
        self
    }

    /// Set the default timeout for one attempt
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Registered data sources, by name
    #[must_use]
    pub const fn data_sources(&self) -> &BTreeMap<String, DataSource> {
        &self.data_sources
    }

    /// Default timeout for one attempt
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Find a data source, preferring an exact name match
    #[must_use]
    pub fn data_source(&self, name: &str) -> Option<&DataSource> {
        self.data_sources.get(name).or_else(|| {
            self.data_sources
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Expand `DSN=` in a parsed connection string
    pub fn expand(&self, mut attributes: ConnectionString) -> ConnectResult<ConnectionString> {
        let Some(name) = attributes.remove(DSN) else {
            return Ok(attributes);
        };

        debug!("Expanding data source '{}'", name);
        let source = self
            .data_source(&name)
            .ok_or_else(|| ConnectError::UnknownDataSource { name: name.clone() })?;

        let registered = ConnectionString::parse(&source.connection_string)?;
        if registered.contains(DSN) {
            return Err(ConnectError::InvalidAttribute {
                key: DSN.to_string(),
                value: format!("data source '{name}' refers to another data source"),
            });
        }

        attributes.merge_defaults(&registered);
        if !attributes.contains(PWD) {
            if let Some(password) = source.password() {
                attributes.insert(PWD, password);
            }
        }
        Ok(attributes)
    }

    /// Parse, expand and validate a connection string without connecting
    pub fn resolve(&self, connection_string: &str) -> ConnectResult<ConnectParams> {
        let parsed = ConnectionString::parse(connection_string)?;
        ConnectParams::from_attributes(&self.expand(parsed)?)
    }

    /// Establish a new connection to the data source the string identifies
    pub async fn connect(&self, connection_string: &str) -> ConnectResult<Connection> {
        let params = self.resolve(connection_string)?;
        self.connect_params(&params).await
    }

    /// Connect with credentials supplied next to the connection string
    ///
    /// A `UID` in the string takes precedence over `user`; `password`, when
    /// given, replaces any `PWD` in the string or data source.
    pub async fn connect_with_credentials(
        &self,
        connection_string: &str,
        user: &str,
        password: Option<&str>,
    ) -> ConnectResult<Connection> {
        let params = self.resolve_with_credentials(connection_string, user, password)?;
        self.connect_params(&params).await
    }

    /// Resolve a connection string plus separately supplied credentials
    ///
    /// Same precedence as [`Connector::connect_with_credentials`].
    pub fn resolve_with_credentials(
        &self,
        connection_string: &str,
        user: &str,
        password: Option<&str>,
    ) -> ConnectResult<ConnectParams> {
        let mut attributes = self.expand(ConnectionString::parse(connection_string)?)?;
        attributes.insert(UID, user);
        if let Some(password) = password {
            attributes.set(PWD, password);
        }
        ConnectParams::from_attributes(&attributes)
    }

    /// Connect with already validated settings
    pub async fn connect_params(&self, params: &ConnectParams) -> ConnectResult<Connection> {
        let timeout = params.connect_timeout.unwrap_or(self.connect_timeout);
        debug!(
            "Connecting: host={}:{}, user={}, database={:?}, timeout={:?}",
            params.host, params.port, params.user, params.database, timeout
        );

        self.retry_policy
            .execute(|| attempt(params, timeout))
            .await
            .map_err(|failure| {
                failure.last_error.log();
                failure.last_error
            })
    }
}

async fn attempt(params: &ConnectParams, timeout: Duration) -> ConnectResult<Connection> {
    let config = params.driver_config(timeout);
    let (client, connection) = tokio::time::timeout(timeout, config.connect(NoTls))
        .await
        .map_err(|_| ConnectError::Timeout { after: timeout })??;

    let id = Uuid::new_v4();
    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(connection_id = %id, "Connection terminated with error: {}", e);
        }
    });

    info!(
        connection_id = %id,
        "Connected to {}:{} as {}", params.host, params.port, params.user
    );

    let info = ConnectionInfo {
        id,
        host: params.host.clone(),
        port: params.port,
        database: params.database.clone(),
        user: params.user.clone(),
        application_name: params.application_name.clone(),
        connected_at: Utc::now(),
    };
    Ok(Connection::new(client, driver, info))
}
