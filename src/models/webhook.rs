use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Outbound event payload. The id is globally unique so receivers can
/// de-duplicate: delivery is at-least-once, never exactly-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: JsonValue,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "merchantId")]
    pub merchant_id: String,
}

impl WebhookEvent {
    pub fn new(merchant_id: &str, event_type: &str, data: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            data,
            timestamp: Utc::now(),
            merchant_id: merchant_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookLogStatus {
    Pending,
    Delivered,
    Failed,
    MaxRetriesReached,
}

/// One row per delivery attempt. Invariant: retry_count <= max_retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub webhook_url: String,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub status: WebhookLogStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a full delivery cycle (all attempts included).
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
