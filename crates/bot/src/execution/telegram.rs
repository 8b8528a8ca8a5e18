//! Operator notifiers: Telegram Bot API, or plain logging when Telegram is
//! not configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::exchange::Notifier;
use crate::constants::TELEGRAM_API_BASE;
use crate::errors::RenewError;

pub struct TelegramNotifier {
    client: reqwest::Client,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    /// A missing token is reported when sending, not here.
    pub fn new(
        timeout: Duration,
        token: Option<String>,
        chat_id: Option<String>,
    ) -> Result<Self, RenewError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            chat_id,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), RenewError> {
        let token = self.token.as_deref().ok_or_else(|| RenewError::NotificationFailed {
            reason: "TELEGRAM_TOKEN is not set".into(),
        })?;

        let url = format!("{TELEGRAM_API_BASE}/bot{token}/sendMessage");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| RenewError::NotificationFailed {
                reason: e.without_url().to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if let Some(reason) = delivery_failure(status, &body) {
            return Err(RenewError::NotificationFailed { reason });
        }

        debug!(chars = text.len(), "telegram message sent");
        Ok(())
    }
}

/// Describe a failed `sendMessage` response, `None` on success.
fn delivery_failure(status: StatusCode, body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let ok = parsed
        .as_ref()
        .and_then(|v| v.get("ok"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if status.is_success() && ok {
        return None;
    }

    Some(match parsed {
        Some(v) => format!(
            "Telegram API {}: {}",
            v.get("error_code").map(Value::to_string).unwrap_or_default(),
            v.get("description").and_then(Value::as_str).unwrap_or_default()
        ),
        None => format!("HTTP {status}"),
    })
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), RenewError> {
        info!(message = %text, "notification (telegram not configured)");
        Ok(())
    }
}
