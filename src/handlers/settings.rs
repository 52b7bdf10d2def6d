use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{MerchantSettings, UpdateWebhookSettingsRequest};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantSettingsQuery {
    pub merchant_id: String,
}

/// Secrets never leave the store; only the URL is echoed back.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSettingsView {
    pub merchant_id: String,
    pub webhook_url: Option<String>,
    pub has_secret: bool,
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: WebhookSettingsView,
}

pub async fn get_webhook_settings(
    State(state): State<AppState>,
    Query(query): Query<MerchantSettingsQuery>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state
        .settings
        .get(&query.merchant_id)
        .await
        .context("Failed to load settings")?
        .unwrap_or(MerchantSettings {
            merchant_id: query.merchant_id.clone(),
            webhook_url: None,
            webhook_secret: None,
        });

    Ok(Json(SettingsResponse {
        success: true,
        settings: WebhookSettingsView {
            merchant_id: settings.merchant_id,
            webhook_url: settings.webhook_url,
            has_secret: settings.webhook_secret.is_some(),
        },
    }))
}

pub async fn update_webhook_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateWebhookSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let merchant_id = headers
        .get("x-sender-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing x-sender-id header".to_string()))?
        .to_string();

    request.validate().map_err(ApiError::Validation)?;

    let settings = MerchantSettings {
        merchant_id: merchant_id.clone(),
        webhook_url: Some(request.webhook_url.clone()),
        webhook_secret: Some(request.webhook_secret.clone()),
    };
    state
        .settings
        .upsert(settings)
        .await
        .context("Failed to save settings")?;

    tracing::info!(merchant_id = %merchant_id, "Webhook settings updated");

    Ok(Json(SettingsResponse {
        success: true,
        settings: WebhookSettingsView {
            merchant_id,
            webhook_url: Some(request.webhook_url),
            has_secret: true,
        },
    }))
}
