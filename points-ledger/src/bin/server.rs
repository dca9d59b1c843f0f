//! Points ledger server binary

use points_ledger::{Config, RewardsLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting points ledger server");

    // Load configuration
    let config = Config::from_env()?;

    // Open ledger
    let _ledger = RewardsLedger::open(config)?;
    tracing::info!("Ledger opened successfully");

    // TODO: mount the HTTP layer once the gateway API settles
    // For now, just keep running
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down points ledger server");
    Ok(())
}
