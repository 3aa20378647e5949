//! Webhook alerting.
//!
//! Delivery never fails past this module: every outcome, including a
//! missing webhook, is folded into a [`DeliveryResult`] for the caller to log.

use crate::config::AlertConfig;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Longest body or error text kept in a summary.
const SUMMARY_LIMIT: usize = 200;

/// Outcome of one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DeliveryResult {
    /// No webhook configured; nothing was sent.
    NotConfigured,
    Delivered {
        status: u16,
        body: String,
        attempts: u32,
    },
    /// Last attempt's outcome after all retries.
    Failed {
        status: Option<u16>,
        body: Option<String>,
        error: Option<String>,
        attempts: u32,
    },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// One-line rendering with bodies and errors truncated.
    pub fn summary(&self) -> String {
        match self {
            Self::NotConfigured => "not configured".to_string(),
            Self::Delivered {
                status,
                body,
                attempts,
            } => format!(
                "delivered status={status} attempts={attempts} body={}",
                truncate(body)
            ),
            Self::Failed {
                status,
                body,
                error,
                attempts,
            } => {
                let mut out = format!("failed attempts={attempts}");
                if let Some(s) = status {
                    out.push_str(&format!(" status={s}"));
                }
                if let Some(b) = body {
                    out.push_str(&format!(" body={}", truncate(b)));
                }
                if let Some(e) = error {
                    out.push_str(&format!(" error={}", truncate(e)));
                }
                out
            }
        }
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Destination for operational alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, title: &str, body: &str) -> DeliveryResult;
}

/// Posts `{title, body, timestamp}` JSON to a webhook.
pub struct AlertDispatcher {
    config: AlertConfig,
    http: reqwest::Client,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    pub fn is_configured(&self) -> bool {
        self.config.webhook_url.is_some()
    }
}

#[async_trait]
impl AlertSink for AlertDispatcher {
    async fn send(&self, title: &str, body: &str) -> DeliveryResult {
        let Some(url) = self.config.webhook_url.as_deref() else {
            return DeliveryResult::NotConfigured;
        };

        let payload = serde_json::json!({
            "title": title,
            "body": body,
            "timestamp": Utc::now(),
        });
        let bytes = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                return DeliveryResult::Failed {
                    status: None,
                    body: None,
                    error: Some(e.to_string()),
                    attempts: 0,
                }
            }
        };
        let signature = self
            .config
            .secret
            .as_deref()
            .and_then(|secret| sign(&bytes, secret));

        let retries = self.config.retries.max(1);
        let mut last = DeliveryResult::Failed {
            status: None,
            body: None,
            error: None,
            attempts: 0,
        };

        for attempt in 1..=retries {
            let mut req = self
                .http
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes.clone());
            if let Some(auth) = &self.config.auth {
                req = req.header("auth", auth);
            }
            if let Some(sig) = &signature {
                req = req.header("x-signature", format!("sha256={sig}"));
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return DeliveryResult::Delivered {
                            status: status.as_u16(),
                            body: text,
                            attempts: attempt,
                        };
                    }
                    tracing::warn!(attempt, status = %status, "alert webhook returned non-success");
                    last = DeliveryResult::Failed {
                        status: Some(status.as_u16()),
                        body: Some(text),
                        error: None,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::warn!(attempt, "alert webhook request failed: {e}");
                    last = DeliveryResult::Failed {
                        status: None,
                        body: None,
                        error: Some(e.to_string()),
                        attempts: attempt,
                    };
                }
            }

            if attempt < retries {
                tokio::time::sleep(backoff_delay(self.config.backoff, attempt)).await;
            }
        }
        last
    }
}

/// Hex HMAC-SHA256 of `payload`; `None` (logged) if the key is rejected.
fn sign(payload: &[u8], secret: &str) -> Option<String> {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(payload);
            Some(hex::encode(mac.finalize().into_bytes()))
        }
        Err(e) => {
            tracing::warn!("alert signing failed, sending unsigned: {e}");
            None
        }
    }
}

/// `base * 2^(attempt-1)` plus up to a quarter of `base` of jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    let quarter = (base.as_millis() / 4) as u64;
    let jitter = rand::thread_rng().gen_range(0..=quarter);
    exp.saturating_add(Duration::from_millis(jitter))
}
