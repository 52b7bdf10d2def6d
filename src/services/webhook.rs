//! Outbound webhook delivery: HMAC-SHA256 signing, bounded retries with
//! exponential backoff, best-effort delivery logging. Also verifies inbound
//! webhook signatures.
//!
//! Headers sent with each delivery:
//! - `X-Webhook-Signature`: sha256=<hex(HMAC(secret, payload bytes))>
//! - `X-Webhook-Event`: event type (e.g. "transfer.claimed")
//! - `X-Webhook-ID`: unique event id, the receiver's de-duplication key

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value as JsonValue;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{DeliveryResult, WebhookEvent, WebhookLog, WebhookLogStatus};
use crate::store::{SettingsStore, WebhookLogStore};

type HmacSha256 = Hmac<Sha256>;

const USER_AGENT: &str = "FlowLink-Webhooks/1.0";
const MAX_RESPONSE_BODY_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_delay: Duration,
}

pub struct WebhookService {
    client: reqwest::Client,
    logs: Arc<dyn WebhookLogStore>,
    settings: Arc<dyn SettingsStore>,
    config: WebhookConfig,
}

impl WebhookService {
    pub fn new(
        config: WebhookConfig,
        logs: Arc<dyn WebhookLogStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            client,
            logs,
            settings,
            config,
        })
    }

    /// Fire-and-forget emission: resolves the merchant's endpoint, spawns the
    /// delivery, and returns immediately. Never fails the calling business
    /// operation.
    pub fn emit(self: &Arc<Self>, merchant_id: &str, event_type: &str, data: JsonValue) {
        let service = Arc::clone(self);
        let merchant_id = merchant_id.to_string();
        let event_type = event_type.to_string();

        tokio::spawn(async move {
            let endpoint = match service.settings.get(&merchant_id).await {
                Ok(Some(settings)) => settings.webhook_url.zip(settings.webhook_secret),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(merchant_id = %merchant_id, error = %e, "Settings lookup failed");
                    None
                }
            };

            let Some((url, secret)) = endpoint else {
                tracing::debug!(merchant_id = %merchant_id, event_type = %event_type, "No webhook endpoint configured");
                return;
            };

            let event = WebhookEvent::new(&merchant_id, &event_type, data);
            let result = service.deliver(&url, &merchant_id, &event, &secret).await;
            if !result.success {
                tracing::warn!(
                    merchant_id = %merchant_id,
                    event_type = %event_type,
                    error = ?result.error,
                    "Webhook delivery exhausted retries"
                );
            }
        });
    }

    /// Delivers one event: up to `max_retries` sequential attempts, each
    /// bounded by the configured timeout, backing off `base * 2^(n-1)`
    /// between attempts. At-least-once: a timed-out attempt may still have
    /// landed, so receivers de-duplicate on the event id.
    pub async fn deliver(
        &self,
        url: &str,
        user_id: &str,
        event: &WebhookEvent,
        secret: &str,
    ) -> DeliveryResult {
        // Serialize once: the signature covers these exact bytes.
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                return DeliveryResult {
                    success: false,
                    status_code: None,
                    response_body: None,
                    error: Some(format!("Payload serialization failed: {}", e)),
                }
            }
        };
        let signature = format!("sha256={}", sign(secret, &payload));

        let mut last_status: Option<u16> = None;
        let mut last_body: Option<String> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.config.max_retries {
            let response = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .header("X-Webhook-Signature", &signature)
                .header("X-Webhook-Event", &event.event_type)
                .header("X-Webhook-ID", event.id.to_string())
                .body(payload.clone())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body: String = resp
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(MAX_RESPONSE_BODY_BYTES)
                        .collect();

                    if (200..300).contains(&status) {
                        tracing::info!(
                            event_id = %event.id,
                            event_type = %event.event_type,
                            status,
                            attempt,
                            "Webhook delivered"
                        );
                        self.log_attempt(
                            user_id,
                            event,
                            url,
                            Some(status),
                            Some(&body),
                            attempt - 1,
                            WebhookLogStatus::Delivered,
                            None,
                        )
                        .await;
                        return DeliveryResult {
                            success: true,
                            status_code: Some(status),
                            response_body: Some(body),
                            error: None,
                        };
                    }

                    last_status = Some(status);
                    last_body = Some(body);
                    last_error = Some(format!("HTTP {}", status));
                }
                Err(e) => {
                    last_status = None;
                    last_body = None;
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.config.max_retries {
                let delay = self.config.base_delay * 2u32.pow(attempt - 1);
                let next_retry_at =
                    Utc::now() + ChronoDuration::milliseconds(delay.as_millis() as i64);

                tracing::warn!(
                    event_id = %event.id,
                    attempt,
                    error = ?last_error,
                    delay_ms = delay.as_millis() as u64,
                    "Webhook attempt failed, backing off"
                );
                self.log_attempt(
                    user_id,
                    event,
                    url,
                    last_status,
                    last_body.as_deref(),
                    attempt,
                    WebhookLogStatus::Pending,
                    Some(next_retry_at),
                )
                .await;

                tokio::time::sleep(delay).await;
            }
        }

        self.log_attempt(
            user_id,
            event,
            url,
            last_status,
            last_body.as_deref(),
            self.config.max_retries,
            WebhookLogStatus::MaxRetriesReached,
            None,
        )
        .await;

        DeliveryResult {
            success: false,
            status_code: last_status,
            response_body: last_body,
            error: last_error,
        }
    }

    /// Verifies an inbound webhook signature against the raw body bytes.
    /// Comparison is constant-time via the HMAC tag check.
    pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> bool {
        let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(hex_sig) else {
            return false;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        mac.verify_slice(&sig_bytes).is_ok()
    }

    // Log writes are best-effort: a failing log store must never fail the
    // business operation that triggered the webhook.
    #[allow(clippy::too_many_arguments)]
    async fn log_attempt(
        &self,
        user_id: &str,
        event: &WebhookEvent,
        url: &str,
        response_status: Option<u16>,
        response_body: Option<&str>,
        retry_count: u32,
        status: WebhookLogStatus,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) {
        let now = Utc::now();
        let log = WebhookLog {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            event_type: event.event_type.clone(),
            payload: serde_json::to_value(event).unwrap_or(JsonValue::Null),
            webhook_url: url.to_string(),
            response_status,
            response_body: response_body.map(|b| b.to_string()),
            retry_count,
            max_retries: self.config.max_retries,
            next_retry_at,
            status,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.logs.append(log).await {
            tracing::warn!(event_id = %event.id, error = %e, "Webhook log write failed");
        }
    }
}

pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
