use dbconnect::cli::{Cli, Commands};
use dbconnect::commands::{check, load_config, parse, sources};
use std::process;
use tracing_subscriber::EnvFilter;

// Allow println in main CLI binary
#[allow(clippy::disallowed_methods)]
fn main() {
    init_logging();

    let cli = Cli::parse();
    tracing::debug!("dbconnect CLI initialized");

    let Some(command) = cli.command else {
        println!("dbconnect - Use --help for available commands");
        return;
    };

    let result = load_config(cli.config.as_deref()).and_then(|config| match command {
        Commands::Check {
            connection_string,
            timeout,
            json,
        } => tokio::runtime::Runtime::new()
            .map_err(anyhow::Error::from)
            .and_then(|rt| {
                rt.block_on(check::handle_check(
                    &config,
                    &connection_string,
                    timeout,
                    json,
                ))
            }),
        Commands::Parse {
            connection_string,
            json,
        } => parse::handle_parse(&config, &connection_string, json),
        Commands::Sources { verbose } => sources::handle_sources(&config, verbose),
    });

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Initialize logging based on environment variables
fn init_logging() {
    // Default to INFO level, can be overridden by RUST_LOG environment variable
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dbconnect=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
