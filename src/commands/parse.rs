use crate::config::Config;
use crate::connection_string::ConnectionString;
use crate::connector::Connector;
use anyhow::Result;

/// Handle the parse command: print resolved attributes with the password hidden
#[allow(clippy::disallowed_methods)]
pub fn handle_parse(config: &Config, connection_string: &str, json: bool) -> Result<()> {
    let connector = Connector::from_config(config);
    let parsed = ConnectionString::parse(connection_string)
        .and_then(|parsed| connector.expand(parsed))
        .map_err(super::connect_failure)?;
    let attributes = parsed.redacted_attributes();

    if json {
        println!("{}", serde_json::to_string_pretty(&attributes)?);
        return Ok(());
    }

    let width = attributes.iter().map(|a| a.key.len()).max().unwrap_or(0);
    for attribute in &attributes {
        println!("{:width$}  {}", attribute.key, attribute.value);
    }
    Ok(())
}
