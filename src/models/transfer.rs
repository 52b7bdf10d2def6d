use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{
    is_valid_address, is_valid_amount, is_valid_email, sanitize_text, FieldError, MAX_NOTE_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    #[serde(rename = "FLOW")]
    Flow,
    #[serde(rename = "USDC")]
    Usdc,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Flow => write!(f, "FLOW"),
            Token::Usdc => write!(f, "USDC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Claimed,
    Expired,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
    Crypto,
    Fiat,
}

/// A claim-based peer-to-peer transfer. Rows are audit records and are
/// never deleted; status only ever moves pending -> {claimed, expired, failed}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub sender_id: String,
    pub sender_address: String,
    pub recipient_email: Option<String>,
    pub amount: f64,
    pub token: Token,
    pub note: Option<String>,
    pub status: TransferStatus,
    /// Bearer capability: possession is the only authorization to claim.
    pub claim_token: String,
    pub claim_link: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_address: Option<String>,
    pub payout_method: Option<PayoutMethod>,
}

impl Transfer {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Projection safe to show anyone holding the claim link: no claim
    /// token, no sender account id. A pending row past its expiry reads
    /// as expired here even though no sweep has flipped the row.
    pub fn public(&self, now: DateTime<Utc>) -> TransferPublic {
        let status = if self.status == TransferStatus::Pending && self.is_expired(now) {
            TransferStatus::Expired
        } else {
            self.status
        };

        TransferPublic {
            id: self.id,
            sender_address: self.sender_address.clone(),
            amount: self.amount,
            token: self.token,
            note: self.note.clone(),
            status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            claimed_at: self.claimed_at,
            claimed_by_address: self.claimed_by_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPublic {
    pub id: Uuid,
    pub sender_address: String,
    pub amount: f64,
    pub token: Token,
    pub note: Option<String>,
    pub status: TransferStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub amount: f64,
    pub token: Token,
    pub recipient_email: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub send_email: bool,
}

impl CreateTransferRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !is_valid_amount(self.amount) {
            errors.push(FieldError::new(
                "amount",
                "must be positive with at most 8 decimal places",
            ));
        }
        if let Some(email) = &self.recipient_email {
            if !is_valid_email(email) {
                errors.push(FieldError::new("recipientEmail", "invalid email address"));
            }
        }
        if self.send_email && self.recipient_email.is_none() {
            errors.push(FieldError::new(
                "recipientEmail",
                "required when sendEmail is true",
            ));
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

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTransferRequest {
    pub claim_token: String,
    pub payout_method: PayoutMethod,
    pub recipient_address: Option<String>,
    pub recipient_email: Option<String>,
}

impl ClaimTransferRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.claim_token.is_empty() {
            errors.push(FieldError::new("claimToken", "required"));
        }

        match self.payout_method {
            PayoutMethod::Crypto => match &self.recipient_address {
                Some(addr) if is_valid_address(addr) => {}
                Some(_) => {
                    errors.push(FieldError::new("recipientAddress", "invalid wallet address"))
                }
                None => errors.push(FieldError::new(
                    "recipientAddress",
                    "required for crypto payout",
                )),
            },
            PayoutMethod::Fiat => match &self.recipient_email {
                Some(email) if is_valid_email(email) => {}
                Some(_) => errors.push(FieldError::new("recipientEmail", "invalid email address")),
                None => errors.push(FieldError::new(
                    "recipientEmail",
                    "required for fiat payout",
                )),
            },
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendClaimEmailRequest {
    pub transfer_id: Uuid,
    pub recipient_email: String,
}

impl SendClaimEmailRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if is_valid_email(&self.recipient_email) {
            Ok(())
        } else {
            Err(vec![FieldError::new(
                "recipientEmail",
                "invalid email address",
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transfer() -> Transfer {
        let now = Utc::now();
        Transfer {
            id: Uuid::new_v4(),
            sender_id: "merchant-1".to_string(),
            sender_address: "0x1234567890abcdef".to_string(),
            recipient_email: None,
            amount: 10.0,
            token: Token::Flow,
            note: None,
            status: TransferStatus::Pending,
            claim_token: "secret".to_string(),
            claim_link: "http://localhost/claim/secret".to_string(),
            expires_at: now + chrono::Duration::days(7),
            created_at: now,
            claimed_at: None,
            claimed_by_address: None,
            payout_method: None,
        }
    }

    #[test]
    fn public_projection_hides_claim_token() {
        let transfer = sample_transfer();
        let json = serde_json::to_value(transfer.public(Utc::now())).unwrap();
        assert!(json.get("claim_token").is_none());
        assert!(json.get("sender_id").is_none());
    }

    #[test]
    fn pending_past_expiry_projects_as_expired() {
        let mut transfer = sample_transfer();
        transfer.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert_eq!(
            transfer.public(Utc::now()).status,
            TransferStatus::Expired
        );
        // the row itself is untouched
        assert_eq!(transfer.status, TransferStatus::Pending);
    }

    #[test]
    fn claim_requires_address_for_crypto() {
        let req = ClaimTransferRequest {
            claim_token: "t".to_string(),
            payout_method: PayoutMethod::Crypto,
            recipient_address: None,
            recipient_email: None,
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "recipientAddress");
    }

    #[test]
    fn claim_requires_email_for_fiat() {
        let req = ClaimTransferRequest {
            claim_token: "t".to_string(),
            payout_method: PayoutMethod::Fiat,
            recipient_address: Some("0x1234567890abcdef".to_string()),
            recipient_email: None,
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "recipientEmail");
    }

    #[test]
    fn token_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Token::Flow).unwrap(), "\"FLOW\"");
        assert_eq!(serde_json::to_string(&Token::Usdc).unwrap(), "\"USDC\"");
    }
}
