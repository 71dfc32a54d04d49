use crate::config::Config;
use crate::connection_string::ConnectionString;
use anyhow::Result;

/// Handle the sources command: list named data sources
#[allow(clippy::disallowed_methods)]
pub fn handle_sources(config: &Config, verbose: bool) -> Result<()> {
    if config.data_sources.is_empty() {
        println!("No data sources configured. Add [data_sources.<name>] to dbconnect.toml.");
        return Ok(());
    }

    println!("🗄️  Configured Data Sources:");
    println!();

    for (name, source) in &config.data_sources {
        match &source.description {
            Some(description) => println!("• {name} - {description}"),
            None => println!("• {name}"),
        }

        if verbose {
            match ConnectionString::parse(&source.connection_string) {
                Ok(parsed) => println!("  Connection:  {parsed}"),
                Err(e) => println!("  Connection:  ❌ {e}"),
            }
            if let Some(var) = &source.password_env {
                let status = if std::env::var_os(var).is_some() {
                    "✅ set"
                } else {
                    "❌ not set"
                };
                println!("  Password:    ${var} ({status})");
            }
        }
    }

    if !verbose {
        println!();
        println!("Use --verbose for connection details.");
    }

    Ok(())
}
