use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UpstreamConfig;

/// One UV measurement from the realtime API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub location: String,
    pub uv_index: f64,
    pub reading_time: String,
}

#[derive(Debug, Deserialize)]
struct RealtimeResponse {
    #[serde(default)]
    data: Vec<Reading>,
}

pub struct UvClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UvClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch the current readings from the realtime API.
    pub async fn fetch_readings(&self) -> Result<Vec<Reading>> {
        debug!("Fetching readings from {}", self.config.endpoint);

        let response = self
            .client
            .get(&self.config.endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach the realtime UV API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Realtime API error ({}): {}", status, error_body);
        }

        let payload: RealtimeResponse = response
            .json()
            .await
            .context("Failed to parse realtime API response")?;

        Ok(payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes() {
        let payload: RealtimeResponse = serde_json::from_str(
            r#"{
                "status": "success",
                "data": [
                    {
                        "id": 42,
                        "location": "Phnom Penh",
                        "uv_index": 8.25,
                        "reading_time": "2026-08-05T12:00:00Z"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(payload.data.len(), 1);
        assert_eq!(payload.data[0].id, 42);
        assert_eq!(payload.data[0].location, "Phnom Penh");
        assert_eq!(payload.data[0].uv_index, 8.25);
        assert_eq!(payload.data[0].reading_time, "2026-08-05T12:00:00Z");
    }

    #[test]
    fn test_missing_data_field_is_empty() {
        let payload: RealtimeResponse = serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        assert!(payload.data.is_empty());
    }

    #[test]
    fn test_reading_serializes_for_passthrough() {
        let reading = Reading {
            id: 1,
            location: "Siem Reap".to_string(),
            uv_index: 3.0,
            reading_time: "2026-08-05T06:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 1,
                "location": "Siem Reap",
                "uv_index": 3.0,
                "reading_time": "2026-08-05T06:00:00Z"
            })
        );
    }
}
