use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::services::WebhookService;

#[derive(Serialize)]
pub struct InboundWebhookResponse {
    pub success: bool,
    pub received: String,
}

/// Inbound webhook receiver. The signature is recomputed over the raw body
/// bytes and compared in constant time; nothing is dispatched for an
/// unsigned or mis-signed event.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundWebhookResponse>, ApiError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;

    if !WebhookService::verify_signature(&state.config.inbound_webhook_secret, &body, signature) {
        return Err(ApiError::Unauthorized(
            "Invalid webhook signature".to_string(),
        ));
    }

    let event_id = headers
        .get("x-webhook-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let event_type = headers
        .get("x-webhook-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info!(
        event_id = %event_id,
        event_type = %event_type,
        "Inbound webhook accepted"
    );

    Ok(Json(InboundWebhookResponse {
        success: true,
        received: event_id,
    }))
}
