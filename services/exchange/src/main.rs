//! tickex exchange service binary

use anyhow::Result;
use clap::Parser;
use exchange::{ExchangeConfig, ExchangeServer};
use std::path::PathBuf;
use tracing::info;

/// TCP limit-order exchange for a single instrument.
#[derive(Parser)]
#[clap(name = "tickex-exchange")]
struct Cli {
    /// Interface to bind.
    #[clap(long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port to listen on.
    #[clap(long, default_value_t = 16_000)]
    port: u16,

    /// Append market-data payloads to per-type binary files in this directory.
    #[clap(long)]
    event_log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = ExchangeConfig {
        host: cli.host,
        port: cli.port,
        event_log_dir: cli.event_log_dir,
    };

    let server = ExchangeServer::bind(&config).await?;
    info!(addr = %server.local_addr()?, "exchange listening");

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
