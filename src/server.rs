use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::telegram::TelegramClient;
use crate::uv::UvClient;
use crate::webhook;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub uv: UvClient,
    pub telegram: TelegramClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let uv = UvClient::new(config.upstream.clone());
        let telegram = TelegramClient::new(config.telegram.clone());
        Self {
            config,
            uv,
            telegram,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/sample-data", get(sample_data))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Passthrough of the upstream readings for the demo page.
async fn sample_data(State(state): State<Arc<AppState>>) -> Response {
    match state.uv.fetch_readings().await {
        Ok(readings) => Json(readings).into_response(),
        Err(e) => {
            error!("Sample data fetch failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

/// Bind the configured address and serve until ctrl-c.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
