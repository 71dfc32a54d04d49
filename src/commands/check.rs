use crate::config::Config;
use crate::connector::Connector;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Serialize)]
struct CheckReport<'a> {
    #[serde(flatten)]
    info: &'a crate::ConnectionInfo,
    latency_ms: f64,
}

/// Handle the check command: connect, ping and report
#[allow(clippy::disallowed_methods)]
pub async fn handle_check(
    config: &Config,
    connection_string: &str,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut connector = Connector::from_config(config);
    if let Some(secs) = timeout {
        if secs == 0 {
            return Err(anyhow!("--timeout must be greater than zero"));
        }
        connector = connector.with_connect_timeout(Duration::from_secs(secs));
    }

    if !json {
        println!("🔌 Connecting...");
    }

    let conn = connector
        .connect(connection_string)
        .await
        .map_err(super::connect_failure)?;
    let latency = conn.ping().await.map_err(super::connect_failure)?;
    info!(connection_id = %conn.info().id, "Connection check passed");

    if json {
        let report = CheckReport {
            info: conn.info(),
            latency_ms: latency.as_secs_f64() * 1000.0,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let info = conn.info();
        println!("   Server:      {}:{}", info.host, info.port);
        println!(
            "   Database:    {}",
            info.database.as_deref().unwrap_or("(server default)")
        );
        println!("   User:        {}", info.user);
        println!("   Latency:     {latency:?}");
        println!("✅ Connection OK");
    }

    conn.close().await;
    Ok(())
}
