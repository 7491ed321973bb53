//! tokenfeed - token launch feed ingester
//!
//! Main entry point for the service

use std::env;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tokenfeed_core::AppConfig;
use tokenfeed_node::TokenService;

const DEFAULT_CONFIG_PATH: &str = "tokenfeed.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting tokenfeed v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = env::var("TOKENFEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(Some(&config_path))?;
    info!(
        "Feed {} (reconnect {:?}, settle {:?}), store capacity {}",
        config.feed.url,
        config.feed.reconnect_delay(),
        config.feed.settle_delay(),
        config.store.capacity
    );

    let service = TokenService::new(config);
    service.start()?;
    info!("Press Ctrl+C to shutdown");

    if let Err(e) = shutdown_signal().await {
        error!("Signal handler error: {}", e);
    }

    service.stop().await;
    info!("Shutdown complete after {:?}", service.uptime());
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
            }
            _ = terminate.recv() => {
                info!("Received termination signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
