use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI interface for `dbconnect`
#[derive(Parser)]
#[command(name = "dbconnect")]
#[command(version = crate::VERSION)]
#[command(about = "dbconnect - Open database connections from connection strings")]
#[command(
    long_about = "Parse, resolve and test ODBC-style or URL connection strings against PostgreSQL"
)]
pub struct Cli {
    /// Configuration file (defaults to ./dbconnect.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Connect, ping the server and report the connection
    Check {
        /// Connection string, e.g. "Server=localhost;UID=app" or a DSN name
        #[arg(value_name = "CONNECTION_STRING")]
        connection_string: String,
        /// Timeout for one attempt in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the attributes a connection string resolves to
    Parse {
        /// Connection string to parse
        #[arg(value_name = "CONNECTION_STRING")]
        connection_string: String,
        /// Print the attributes as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured data sources
    Sources {
        /// Show connection strings and password variables
        #[arg(long)]
        verbose: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
