use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_upstream_config")]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_telegram_config")]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Realtime UV API endpoint returning `{status, data: [...]}`.
    #[serde(default = "default_upstream_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Bot token used for sendMessage. Normally supplied via the
    /// TELEGRAM_BOT_TOKEN environment variable rather than the file.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Shared webhook secret. Absent means the secret check is skipped.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_upstream_endpoint() -> String {
    "https://data.mef.gov.kh/api/v1/realtime-api/uv".to_string()
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind_addr: default_bind_addr(),
    }
}

fn default_upstream_config() -> UpstreamConfig {
    UpstreamConfig {
        endpoint: default_upstream_endpoint(),
    }
}

fn default_telegram_config() -> TelegramConfig {
    TelegramConfig {
        api_base: default_api_base(),
        bot_token: None,
        webhook_secret: None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server_config(),
            upstream: default_upstream_config(),
            telegram: default_telegram_config(),
        }
    }
}

impl Config {
    /// Load the config file (if present) and apply the environment secrets.
    /// A missing file is not an error: every field has a default and the
    /// secrets usually arrive through the environment anyway.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                config.telegram.bot_token = Some(token);
            }
        }
        if let Ok(secret) = std::env::var("TELEGRAM_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                config.telegram.webhook_secret = Some(secret);
            }
        }

        Ok(config)
    }
}
