//! Fleet Monitor - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(config.log_format).context("Failed to set tracing subscriber")?;

    info!("=== Fleet Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Remote speech: {}",
        if config.speech.remote_enabled() { "ElevenLabs" } else { "local only" }
    );

    run_server(config).await.context("API server failed")?;

    Ok(())
}
