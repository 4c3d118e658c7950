//! APY Aggregator Service
//!
//! Serves normalized stablecoin flexible-savings yields from four exchanges.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin apy-aggregator -- --config config/aggregator.toml
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! APY_AGGREGATOR_CONFIG_PATH=config/aggregator.toml cargo run --bin apy-aggregator
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use apy_aggregator::api::ApiServer;
use apy_aggregator::config::Config;
use apy_aggregator::exchange::build_adapters;
use apy_aggregator::Aggregator;

#[derive(Parser, Debug)]
#[command(name = "apy-aggregator")]
#[command(about = "Aggregates stablecoin flexible-savings APY across exchanges")]
struct Args {
    /// Path to configuration file (default: config/aggregator.toml or APY_AGGREGATOR_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the API port from the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting APY Aggregator Service");

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.api.port = port;
    }
    info!(
        "Configuration loaded: cache ttl {}s, exchange timeout {}ms",
        config.cache.ttl_secs, config.http.timeout_ms
    );

    let aggregator = Aggregator::new(build_adapters(&config)?);
    info!("Aggregator initialized with {} exchanges", aggregator.adapter_count());

    let api_server = ApiServer::new(config, aggregator);

    // Run the service (this blocks until shutdown)
    api_server.run().await?;

    Ok(())
}
