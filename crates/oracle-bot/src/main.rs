//! Oracle price relay - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Pyth Hermes to Hyperliquid HIP-3 oracle relay
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ORACLE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    oracle_telemetry::init_logging()?;

    info!("Starting oracle relay v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ORACLE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("ORACLE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = oracle_bot::AppConfig::from_file(&config_path)?;
    let app = oracle_bot::Application::new(config)?;

    if args.once {
        let outcome = app.run_once().await?;
        info!(published = outcome.is_published(), "Single cycle finished");
        return Ok(());
    }

    app.run().await?;

    Ok(())
}
