//! tickex market simulator binary

use anyhow::Result;
use clap::Parser;
use simulator::{MarketSimulator, SimulatorConfig};
use tracing::info;

/// Stochastic liquidity simulator for the tickex exchange.
#[derive(Parser)]
#[clap(name = "tickex-simulator")]
struct Cli {
    /// Exchange host.
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Exchange TCP port.
    #[clap(long, default_value_t = 16_000)]
    port: u16,

    /// RNG seed.
    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// RNG stream selector.
    #[clap(long, default_value_t = 1)]
    stream: u64,

    /// Tick interval in microseconds.
    #[clap(long, default_value_t = 1_000)]
    tick_interval_us: u64,
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
    let config = SimulatorConfig {
        host: cli.host,
        port: cli.port,
        seed: cli.seed,
        stream: cli.stream,
        tick_interval_us: cli.tick_interval_us,
        ..SimulatorConfig::default()
    };

    info!(host = %config.host, port = config.port, seed = config.seed, "starting simulator");
    let simulator = MarketSimulator::connect(config).await?;
    simulator
        .run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
