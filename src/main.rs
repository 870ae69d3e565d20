//! Server entry point - loads configuration and hands off to the Axum
//! composition root.

use std::net::IpAddr;

use clap::Parser;
use halterra_axum::{ServerConfig, start_server};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,halterra=debug,halterra_core=debug,halterra_axum=debug,halterra_upstream=debug";

/// Request-handling service for the Halterra meditation app.
#[derive(Debug, Parser)]
#[command(name = "halterra", version, about)]
struct Cli {
    /// Port to listen on (overrides HALTERRA_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides HALTERRA_BIND)
    #[arg(short, long)]
    bind: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(bind) = cli.bind {
        config = config.with_bind(bind);
    }

    start_server(config).await
}
