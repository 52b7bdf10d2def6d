use serde::{Deserialize, Serialize};

use crate::validation::{is_valid_url, FieldError};

/// Per-merchant webhook endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantSettings {
    pub merchant_id: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhookSettingsRequest {
    pub webhook_url: String,
    pub webhook_secret: String,
}

impl UpdateWebhookSettingsRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !is_valid_url(&self.webhook_url) {
            errors.push(FieldError::new("webhookUrl", "must be an http(s) URL"));
        }
        if self.webhook_secret.len() < 16 {
            errors.push(FieldError::new(
                "webhookSecret",
                "must be at least 16 characters",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
