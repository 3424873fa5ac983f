//! `cosmo serve`: run the MCP server over stdio or HTTP.

use super::{build_guard, build_registry, load_config, load_connections};
use anyhow::{Context, Result};
use clap::Args;
use cosmo_core::Transport;
use cosmo_mcp::{McpServer, ToolExecutor};
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for `cosmo serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "cosmo.yaml", env = "COSMO_CONFIG")]
    pub config: PathBuf,

    /// Transport type (stdio or http). Overrides config file.
    #[arg(long)]
    pub transport: Option<String>,

    /// HTTP host (only for http transport). Overrides config file.
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port (only for http transport). Overrides config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Skip connecting to every registered connection before serving.
    #[arg(long, default_value_t = false)]
    pub lazy: bool,
}

pub fn parse_transport(value: &str) -> Result<Transport> {
    match value.to_ascii_lowercase().as_str() {
        "stdio" => Ok(Transport::Stdio),
        "http" => Ok(Transport::Http),
        other => anyhow::bail!("Unknown transport: {}. Use 'stdio' or 'http'", other),
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;

    if let Some(transport) = args.transport.as_deref() {
        config.mcp.transport = parse_transport(transport)?;
    }
    if let Some(host) = args.host {
        config.mcp.host = host;
    }
    if let Some(port) = args.port {
        config.mcp.port = port;
    }

    info!(
        transport = ?config.mcp.transport,
        host = %config.mcp.host,
        port = config.mcp.port,
        "MCP server configuration"
    );

    let registry = build_registry(load_connections()?);
    let guard = build_guard(&registry);

    if config.connect_on_startup && !args.lazy {
        let report = registry.connect_all().await;
        info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            "Startup connections established"
        );
        for failure in &report.failed {
            warn!(id = %failure.id, error = %failure.error, "Connection unavailable at startup");
        }
    }

    let executor = ToolExecutor::new(registry, guard, config.sampling);
    let server = McpServer::new(config.mcp, executor);
    server.run().await.context("MCP server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport() {
        assert_eq!(parse_transport("stdio").unwrap(), Transport::Stdio);
        assert_eq!(parse_transport("HTTP").unwrap(), Transport::Http);

        let err = parse_transport("sse").unwrap_err();
        assert_eq!(err.to_string(), "Unknown transport: sse. Use 'stdio' or 'http'");
    }
}
