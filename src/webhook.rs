use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::server::AppState;
use crate::telegram::{escape_markdown, TelegramUpdate};
use crate::uv::Reading;

/// Header Telegram echoes the configured webhook secret back in.
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Most readings included in a single /uv reply.
const MAX_READINGS: usize = 5;

const WELCOME_MESSAGE: &str = "*Welcome to the Cambodia UV Monitor*\n\
    Use /uv to retrieve the latest UV readings from the Ministry of Economy and Finance realtime API.";

const NO_READINGS_MESSAGE: &str = "No readings are available right now.";

const UNKNOWN_COMMAND_MESSAGE: &str =
    "Unknown command. Try /uv to fetch the current UV measurements.";

/// Webhook endpoint Telegram delivers updates to.
///
/// Always acknowledges with `{ok:true}` once the secret and token checks have
/// passed: Telegram retries updates that receive a non-200 response, and a
/// downstream failure is reported to the chat instead.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // The secret is checked before the body is even parsed.
    if !secret_matches(&headers, state.config.telegram.webhook_secret.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid secret");
    }

    let Some(token) = state.config.telegram.bot_token.as_deref() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Missing TELEGRAM_BOT_TOKEN");
    };

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Discarding webhook body that is not a Telegram update: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Malformed update");
        }
    };

    // Telegram delivers plenty of non-message updates (edits, channel posts,
    // member changes). They must be acknowledged, not answered.
    let Some(message) = update.message else {
        return ack();
    };
    let Some(chat) = message.chat.as_ref() else {
        return ack();
    };
    let chat_id = chat.id;
    let text = match message.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return ack(),
    };

    let (sender_name, sender_id) = message
        .from
        .as_ref()
        .map(|user| (user.first_name.as_deref().unwrap_or("?"), user.id))
        .unwrap_or(("?", 0));
    info!(
        "Message from {} ({}) in chat {}: {}",
        sender_name, sender_id, chat_id, text
    );
    debug!(
        "Update envelope: message_id={} date={} chat_type={}",
        message.message_id, message.date, chat.chat_type
    );

    if let Err(e) = dispatch_command(&state, token, chat_id, &text).await {
        error!("Command handling failed: {:#}", e);
        let notice = format!(
            "Could not complete the request: {}",
            escape_markdown(&format!("{:#}", e))
        );
        if let Err(send_err) = state.telegram.send_message(token, chat_id, &notice).await {
            // A failed error notice must not turn into a non-200 webhook
            // response, so it is only logged here.
            warn!(
                "Failed to deliver error notice to chat {}: {:#}",
                chat_id, send_err
            );
        }
    }

    ack()
}

/// Route a command to its reply. Each path sends exactly one message.
async fn dispatch_command(
    state: &AppState,
    token: &str,
    chat_id: i64,
    text: &str,
) -> Result<()> {
    if text.starts_with("/start") {
        state
            .telegram
            .send_message(token, chat_id, WELCOME_MESSAGE)
            .await
    } else if text.starts_with("/uv") {
        let readings = state.uv.fetch_readings().await?;
        if readings.is_empty() {
            state
                .telegram
                .send_message(token, chat_id, NO_READINGS_MESSAGE)
                .await
        } else {
            let report = readings
                .iter()
                .take(MAX_READINGS)
                .map(format_reading)
                .collect::<Vec<_>>()
                .join("\n\n");
            state.telegram.send_message(token, chat_id, &report).await
        }
    } else {
        state
            .telegram
            .send_message(token, chat_id, UNKNOWN_COMMAND_MESSAGE)
            .await
    }
}

/// Render one reading as a 3-line MarkdownV2 block.
fn format_reading(reading: &Reading) -> String {
    format!(
        "*{}*\nUV Index: *{:.1}*\nRecorded: {}",
        escape_markdown(&reading.location),
        reading.uv_index,
        escape_markdown(&format_reading_time(&reading.reading_time)),
    )
}

/// Render a reading timestamp as RFC-1123-style UTC, e.g.
/// "Wed, 05 Aug 2026 12:34:56 GMT". Unparseable input is shown raw.
fn format_reading_time(raw: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        });
    match parsed {
        Ok(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Compare the configured webhook secret against the header Telegram sends.
/// No configured secret means every request passes.
fn secret_matches(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected)
}

fn ack() -> Response {
    Json(json!({ "ok": true })).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn reading(location: &str, uv_index: f64, reading_time: &str) -> Reading {
        Reading {
            id: 1,
            location: location.to_string(),
            uv_index,
            reading_time: reading_time.to_string(),
        }
    }

    #[test]
    fn test_format_reading_escapes_location() {
        let block = format_reading(&reading("Phnom Penh (Center)", 7.3, "2026-08-05T12:34:56Z"));
        assert_eq!(
            block,
            "*Phnom Penh \\(Center\\)*\nUV Index: *7.3*\nRecorded: Wed, 05 Aug 2026 12:34:56 GMT"
        );
    }

    #[test]
    fn test_format_reading_one_decimal() {
        let block = format_reading(&reading("Kampot", 11.0, "2026-08-05T00:00:00Z"));
        assert!(block.contains("UV Index: *11.0*"));
    }

    #[test]
    fn test_format_reading_time_rfc3339() {
        assert_eq!(
            format_reading_time("2026-08-05T12:34:56Z"),
            "Wed, 05 Aug 2026 12:34:56 GMT"
        );
    }

    #[test]
    fn test_format_reading_time_naive() {
        assert_eq!(
            format_reading_time("2026-08-05 12:34:56"),
            "Wed, 05 Aug 2026 12:34:56 GMT"
        );
    }

    #[test]
    fn test_format_reading_time_offset_is_normalized_to_utc() {
        assert_eq!(
            format_reading_time("2026-08-05T19:34:56+07:00"),
            "Wed, 05 Aug 2026 12:34:56 GMT"
        );
    }

    #[test]
    fn test_format_reading_time_garbage_passes_through() {
        assert_eq!(format_reading_time("just now"), "just now");
    }

    fn headers_with_secret(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_secret_skipped_when_unconfigured() {
        assert!(secret_matches(&HeaderMap::new(), None));
        assert!(secret_matches(&headers_with_secret("anything"), None));
    }

    #[test]
    fn test_secret_must_match_exactly() {
        assert!(secret_matches(&headers_with_secret("s3cret"), Some("s3cret")));
        assert!(!secret_matches(&headers_with_secret("wrong"), Some("s3cret")));
        assert!(!secret_matches(&headers_with_secret(""), Some("s3cret")));
        assert!(!secret_matches(&HeaderMap::new(), Some("s3cret")));
    }
}
