//! Database connection handle

use crate::errors::ConnectResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tracing::{debug, warn};
use uuid::Uuid;

/// Descriptive details of an established connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Identifier used in log lines for this connection
    pub id: Uuid,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name, when one was requested
    pub database: Option<String>,
    /// Authenticated user
    pub user: String,
    /// Application name reported to the server
    pub application_name: Option<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
}

/// A live link to a database server
///
/// The socket is driven by a background tokio task. Dropping the handle
/// closes the link; [`Connection::close`] does the same and waits for the
/// background task to finish.
pub struct Connection {
    client: Client,
    driver: JoinHandle<()>,
    info: ConnectionInfo,
}

impl Connection {
    pub(crate) const fn new(client: Client, driver: JoinHandle<()>, info: ConnectionInfo) -> Self {
        Self {
            client,
            driver,
            info,
        }
    }

    /// Details about this connection
    #[must_use]
    pub const fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Whether the server side has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Make a round trip to the server and return its latency
    pub async fn ping(&self) -> ConnectResult<Duration> {
        let start = Instant::now();
        self.client.simple_query("SELECT 1").await?;
        let latency = start.elapsed();
        debug!(connection_id = %self.info.id, "Ping took {:?}", latency);
        Ok(latency)
    }

    /// The underlying driver client
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Close the connection and wait for the socket task to finish
    pub async fn close(self) {
        let Self {
            client,
            driver,
            info,
        } = self;
        drop(client);

        if let Err(e) = driver.await {
            warn!(connection_id = %info.id, "Connection task did not shut down cleanly: {}", e);
        }
        debug!(connection_id = %info.id, "Connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("info", &self.info)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
