//! fleetops - remote command execution across a fleet of hosts
//!
//! CLI entry point for the fleetops server and tools.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod server;
mod websocket;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = server::load_config()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fleetops=info,fleetops_core=info,tower_http=info".into());
    // logs go to stderr so `fleetops run` output stays clean on stdout
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    server::validate_config(&config)?;

    if cli.command.is_some() {
        info!("Starting fleetops v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli, config).await
}
