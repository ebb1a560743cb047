mod config;
mod server;
mod telegram;
mod uv;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,uvbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("  Bind address: {}", config.server.bind_addr);
    info!("  Upstream endpoint: {}", config.upstream.endpoint);
    info!(
        "  Bot token configured: {}",
        config.telegram.bot_token.is_some()
    );
    info!(
        "  Webhook secret configured: {}",
        config.telegram.webhook_secret.is_some()
    );

    let state = Arc::new(AppState::new(config));

    info!("Webhook service is starting...");
    server::run(state).await?;

    Ok(())
}
