use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Token;
use crate::validation::{is_valid_amount, is_valid_email, sanitize_text, FieldError, MAX_NOTE_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Link,
    Email,
}

/// A future-dated payment intent. Only the driver mutates these rows, and
/// only along pending -> processing -> {completed, failed}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub id: Uuid,
    pub merchant_id: String,
    pub merchant_address: String,
    pub amount: f64,
    pub token: Token,
    pub delivery_method: DeliveryMethod,
    pub recipient_email: Option<String>,
    pub note: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduledStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub result_transfer_id: Option<Uuid>,
    pub result_claim_link: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduledPaymentRequest {
    pub amount: f64,
    pub token: Token,
    pub delivery_method: DeliveryMethod,
    pub recipient_email: Option<String>,
    pub note: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

impl CreateScheduledPaymentRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !is_valid_amount(self.amount) {
            errors.push(FieldError::new(
                "amount",
                "must be positive with at most 8 decimal places",
            ));
        }

        match self.delivery_method {
            DeliveryMethod::Email => match &self.recipient_email {
                Some(email) if is_valid_email(email) => {}
                Some(_) => errors.push(FieldError::new("recipientEmail", "invalid email address")),
                None => errors.push(FieldError::new(
                    "recipientEmail",
                    "required for email delivery",
                )),
            },
            DeliveryMethod::Link => {
                if let Some(email) = &self.recipient_email {
                    if !is_valid_email(email) {
                        errors.push(FieldError::new("recipientEmail", "invalid email address"));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn sanitized_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(|n| sanitize_text(n, MAX_NOTE_LEN))
            .filter(|n| !n.is_empty())
    }
}
