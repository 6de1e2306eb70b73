//! # Chat Hub Server
//!
//! Realtime chat hub: rooms, direct messages, presence and heartbeats.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! chathub
//!
//! # Run with a specific config file
//! CHATHUB_CONFIG=/path/to/chathub.toml chathub
//!
//! # Run with environment variables
//! CHATHUB_PORT=8080 CHATHUB_HOST=0.0.0.0 chathub
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chathub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting chat hub on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
