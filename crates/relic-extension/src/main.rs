//! New Relic extension binary.
//!
//! Serves the extension API to the platform agent until interrupted.

use anyhow::Context;
use clap::Parser;
use relic_client::NewRelicClient;
use relic_extension::{ExtensionArgs, ExtensionServer, LogFormat};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ExtensionArgs::parse();
    init_logging(args.log_format);

    let config = args.into_config().context("invalid configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr,
        api = %config.client.api_base_url,
        "Starting New Relic extension"
    );

    let client = NewRelicClient::new(config.client.clone())
        .context("failed to build New Relic client")?;
    let server = ExtensionServer::new(client, config);
    server.serve_with_shutdown(shutdown_signal()).await?;
    Ok(())
}
