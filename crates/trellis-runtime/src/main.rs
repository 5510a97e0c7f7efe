//! # Trellis Runtime
//!
//! Loads configuration, installs tracing, starts every component and runs
//! until Ctrl+C.

use anyhow::{Context, Result};
use tracing::info;

use trellis_runtime::{telemetry, RuntimeConfig, TrellisRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;

    telemetry::init_tracing(&config.log).context("Failed to initialize tracing")?;

    let runtime = TrellisRuntime::new(config).context("Failed to build runtime")?;
    runtime.start().context("Failed to start components")?;

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.print_status();
    runtime.shutdown();

    Ok(())
}
