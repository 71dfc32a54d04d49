//! Synchronous connection API
//!
//! Each [`Connection`] owns a single-threaded tokio runtime that drives its
//! socket whenever one of its methods is called. These functions must not be
//! called from inside an async runtime; tokio panics if they are.

use crate::connection::ConnectionInfo;
use crate::connector::Connector;
use crate::errors::ConnectResult;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Establish a new connection to the data source identified by the string
///
/// # Example
/// ```rust,no_run
/// let conn = dbconnect::blocking::connect("Server=localhost;UID=postgres")?;
/// println!("connected as {}", conn.info().user);
/// # Ok::<(), dbconnect::ConnectError>(())
/// ```
pub fn connect(connection_string: &str) -> ConnectResult<Connection> {
    Connector::new().connect_blocking(connection_string)
}

/// A connection usable from synchronous code
#[derive(Debug)]
pub struct Connection {
    // Declared first so the client is dropped while the runtime still exists.
    inner: crate::Connection,
    runtime: Runtime,
}

impl Connection {
    /// Details about this connection
    #[must_use]
    pub const fn info(&self) -> &ConnectionInfo {
        self.inner.info()
    }

    /// Whether the server side has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Make a round trip to the server and return its latency
    pub fn ping(&self) -> ConnectResult<Duration> {
        self.runtime.block_on(self.inner.ping())
    }

    /// Close the connection and wait for the socket task to finish
    pub fn close(self) {
        let Self { inner, runtime } = self;
        runtime.block_on(inner.close());
    }
}

impl Connector {
    /// Synchronous counterpart of [`Connector::connect`]
    pub fn connect_blocking(&self, connection_string: &str) -> ConnectResult<Connection> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let inner = runtime.block_on(self.connect(connection_string))?;
        Ok(Connection { inner, runtime })
    }
}
