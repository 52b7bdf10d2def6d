//! Transfer claim manager: claim-based peer-to-peer transfers with expiry
//! and dual payout paths. State machine:
//! pending -> {claimed, expired, failed}, all terminal, never reversed.

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::RngCore;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    ClaimTransferRequest, CreateTransferRequest, PayoutMethod, SendClaimEmailRequest, Transfer,
    TransferPublic, TransferStatus,
};
use crate::services::collaborators::{EmailSender, FiatSettlement};
use crate::services::webhook::WebhookService;
use crate::store::TransferStore;
use crate::validation::is_valid_address;

pub struct TransferService {
    store: Arc<dyn TransferStore>,
    webhooks: Arc<WebhookService>,
    email: Arc<dyn EmailSender>,
    fiat: Arc<dyn FiatSettlement>,
    base_url: String,
    ttl: Duration,
}

impl TransferService {
    pub fn new(
        store: Arc<dyn TransferStore>,
        webhooks: Arc<WebhookService>,
        email: Arc<dyn EmailSender>,
        fiat: Arc<dyn FiatSettlement>,
        base_url: &str,
        ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            webhooks,
            email,
            fiat,
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub async fn create(
        &self,
        sender_id: &str,
        sender_address: &str,
        request: &CreateTransferRequest,
    ) -> Result<Transfer, ApiError> {
        request.validate().map_err(ApiError::Validation)?;
        if !is_valid_address(sender_address) {
            return Err(ApiError::Unauthorized(
                "Invalid sender address".to_string(),
            ));
        }

        let now = Utc::now();
        let claim_token = generate_claim_token();
        let claim_link = format!("{}/claim/{}", self.base_url, claim_token);

        let transfer = Transfer {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            sender_address: sender_address.to_string(),
            recipient_email: request.recipient_email.clone(),
            amount: request.amount,
            token: request.token,
            note: request.sanitized_note(),
            status: TransferStatus::Pending,
            claim_token,
            claim_link,
            expires_at: now + self.ttl,
            created_at: now,
            claimed_at: None,
            claimed_by_address: None,
            payout_method: None,
        };

        self.store
            .insert(transfer.clone())
            .await
            .context("Failed to persist transfer")?;

        tracing::info!(
            transfer_id = %transfer.id,
            sender_id = %sender_id,
            amount = transfer.amount,
            token = %transfer.token,
            "Transfer created"
        );

        if request.send_email {
            if let Some(recipient) = &transfer.recipient_email {
                self.spawn_claim_email(&transfer, recipient);
            }
        }

        self.webhooks.emit(
            sender_id,
            "transfer.created",
            json!({
                "transferId": transfer.id,
                "amount": transfer.amount,
                "token": transfer.token,
                "expiresAt": transfer.expires_at,
            }),
        );

        Ok(transfer)
    }

    /// At most one claim ever succeeds: the store transition is conditional
    /// on the row still being pending, so a concurrent racer gets Conflict.
    pub async fn claim(&self, request: &ClaimTransferRequest) -> Result<Transfer, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let transfer = self
            .store
            .find_by_claim_token(&request.claim_token)
            .await
            .context("Failed to look up transfer")?
            .ok_or_else(|| ApiError::NotFound("Unknown claim token".to_string()))?;

        match transfer.status {
            TransferStatus::Pending => {}
            TransferStatus::Claimed => {
                return Err(ApiError::Conflict("Transfer already claimed".to_string()))
            }
            TransferStatus::Expired | TransferStatus::Failed => {
                return Err(ApiError::Conflict("Transfer is no longer claimable".to_string()))
            }
        }

        let now = Utc::now();
        if transfer.is_expired(now) {
            // Lazy expiry: the row stays pending, the claim is refused.
            return Err(ApiError::Conflict("Transfer has expired".to_string()));
        }

        // For fiat payouts the recipient identity is the off-ramp email.
        let claimed_by = match request.payout_method {
            PayoutMethod::Crypto => request.recipient_address.as_deref(),
            PayoutMethod::Fiat => request.recipient_email.as_deref(),
        }
        .ok_or_else(|| {
            ApiError::Validation(vec![crate::validation::FieldError::new(
                "payoutMethod",
                "missing payout destination",
            )])
        })?;

        let claimed = self
            .store
            .claim_if_pending(&request.claim_token, claimed_by, request.payout_method, now)
            .await
            .context("Failed to claim transfer")?
            .ok_or_else(|| ApiError::Conflict("Transfer already claimed".to_string()))?;

        tracing::info!(
            transfer_id = %claimed.id,
            payout_method = ?request.payout_method,
            "Transfer claimed"
        );

        if request.payout_method == PayoutMethod::Fiat {
            self.spawn_fiat_payout(&claimed);
        }

        self.webhooks.emit(
            &claimed.sender_id,
            "transfer.claimed",
            json!({
                "transferId": claimed.id,
                "amount": claimed.amount,
                "token": claimed.token,
                "payoutMethod": request.payout_method,
                "claimedAt": claimed.claimed_at,
            }),
        );

        Ok(claimed)
    }

    pub async fn get_details(&self, claim_token: &str) -> Result<TransferPublic, ApiError> {
        let transfer = self
            .store
            .find_by_claim_token(claim_token)
            .await
            .context("Failed to look up transfer")?
            .ok_or_else(|| ApiError::NotFound("Unknown claim token".to_string()))?;

        Ok(transfer.public(Utc::now()))
    }

    pub async fn list_by_sender(&self, sender_id: &str) -> Result<Vec<Transfer>, ApiError> {
        Ok(self
            .store
            .list_by_sender(sender_id)
            .await
            .context("Failed to list transfers")?)
    }

    /// Re-sends the claim email. Only allowed while the transfer is still
    /// claimable; an email failure surfaces as Upstream and leaves the
    /// transfer untouched.
    pub async fn send_claim_email(
        &self,
        request: &SendClaimEmailRequest,
    ) -> Result<(), ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let transfer = self
            .store
            .find_by_id(request.transfer_id)
            .await
            .context("Failed to look up transfer")?
            .ok_or_else(|| ApiError::NotFound("Transfer not found".to_string()))?;

        if transfer.status != TransferStatus::Pending || transfer.is_expired(Utc::now()) {
            return Err(ApiError::Conflict(
                "Transfer is no longer claimable".to_string(),
            ));
        }

        self.email
            .send_claim_email(
                &request.recipient_email,
                &transfer.claim_link,
                transfer.amount,
                transfer.token,
            )
            .await
            .map_err(|e| ApiError::Upstream(format!("Email delivery failed: {}", e)))?;

        Ok(())
    }

    fn spawn_claim_email(&self, transfer: &Transfer, recipient: &str) {
        let email = Arc::clone(&self.email);
        let recipient = recipient.to_string();
        let claim_link = transfer.claim_link.clone();
        let (amount, token, id) = (transfer.amount, transfer.token, transfer.id);

        tokio::spawn(async move {
            if let Err(e) = email
                .send_claim_email(&recipient, &claim_link, amount, token)
                .await
            {
                tracing::warn!(transfer_id = %id, error = %e, "Claim email failed");
            }
        });
    }

    fn spawn_fiat_payout(&self, transfer: &Transfer) {
        let fiat = Arc::clone(&self.fiat);
        let Some(recipient) = transfer.claimed_by_address.clone() else {
            return;
        };
        let (id, amount, token) = (transfer.id, transfer.amount, transfer.token);

        tokio::spawn(async move {
            if let Err(e) = fiat.initiate_payout(id, &recipient, amount, token).await {
                // The claim stands; the off-ramp handoff is retried out of band.
                tracing::error!(transfer_id = %id, error = %e, "Fiat payout initiation failed");
            }
        });
    }
}

/// 32 random bytes, hex-encoded. The token is a bearer capability, so it has
/// to be unguessable and is never reused.
fn generate_claim_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;
    use crate::services::collaborators::{LogEmailSender, LogFiatSettlement};
    use crate::services::webhook::WebhookConfig;
    use crate::store::memory::{
        MemorySettingsStore, MemoryTransferStore, MemoryWebhookLogStore,
    };
    use std::collections::HashSet;
    use std::time::Duration as StdDuration;

    fn service_with_ttl(ttl_secs: i64) -> TransferService {
        let webhooks = Arc::new(
            WebhookService::new(
                WebhookConfig {
                    max_retries: 1,
                    timeout: StdDuration::from_secs(1),
                    base_delay: StdDuration::from_millis(10),
                },
                Arc::new(MemoryWebhookLogStore::new()),
                Arc::new(MemorySettingsStore::new()),
            )
            .unwrap(),
        );

        TransferService::new(
            Arc::new(MemoryTransferStore::new()),
            webhooks,
            Arc::new(LogEmailSender),
            Arc::new(LogFiatSettlement),
            "http://localhost:8080",
            ttl_secs,
        )
    }

    fn service() -> TransferService {
        service_with_ttl(3600)
    }

    fn create_request(amount: f64) -> CreateTransferRequest {
        CreateTransferRequest {
            amount,
            token: Token::Flow,
            recipient_email: None,
            note: Some("lunch <b>money</b>".to_string()),
            send_email: false,
        }
    }

    fn crypto_claim(token: &str, address: &str) -> ClaimTransferRequest {
        ClaimTransferRequest {
            claim_token: token.to_string(),
            payout_method: PayoutMethod::Crypto,
            recipient_address: Some(address.to_string()),
            recipient_email: None,
        }
    }

    #[tokio::test]
    async fn create_generates_unique_tokens_embedded_in_links() {
        let service = service();
        let mut tokens = HashSet::new();

        for _ in 0..50 {
            let transfer = service
                .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
                .await
                .unwrap();
            assert!(transfer.claim_link.ends_with(&transfer.claim_token));
            assert_eq!(transfer.claim_link.matches(&transfer.claim_token).count(), 1);
            assert!(tokens.insert(transfer.claim_token));
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_amount() {
        let service = service();
        let err = service
            .create("sender-1", "0x1234567890abcdef", &create_request(0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn create_strips_html_from_note() {
        let service = service();
        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();
        assert_eq!(transfer.note.as_deref(), Some("lunch money"));
    }

    #[tokio::test]
    async fn claim_before_expiry_succeeds() {
        let service = service();
        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();

        let claimed = service
            .claim(&crypto_claim(&transfer.claim_token, "0xabcabcabcabcabca"))
            .await
            .unwrap();

        assert_eq!(claimed.status, TransferStatus::Claimed);
        assert_eq!(
            claimed.claimed_by_address.as_deref(),
            Some("0xabcabcabcabcabca")
        );
        assert!(claimed.claimed_at.is_some());
    }

    #[tokio::test]
    async fn claim_after_expiry_fails_while_row_stays_pending() {
        let service = service_with_ttl(0);
        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();

        let err = service
            .claim(&crypto_claim(&transfer.claim_token, "0xabcabcabcabcabca"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // projection reports expired even though the row was never swept
        let public = service.get_details(&transfer.claim_token).await.unwrap();
        assert_eq!(public.status, TransferStatus::Expired);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let service = service();
        let err = service
            .claim(&crypto_claim("no-such-token", "0xabcabcabcabcabca"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_double_claim_yields_one_winner() {
        let store = Arc::new(MemoryTransferStore::new());
        let webhooks = Arc::new(
            WebhookService::new(
                WebhookConfig {
                    max_retries: 1,
                    timeout: StdDuration::from_secs(1),
                    base_delay: StdDuration::from_millis(10),
                },
                Arc::new(MemoryWebhookLogStore::new()),
                Arc::new(MemorySettingsStore::new()),
            )
            .unwrap(),
        );
        let service = Arc::new(TransferService::new(
            store,
            webhooks,
            Arc::new(LogEmailSender),
            Arc::new(LogFiatSettlement),
            "http://localhost:8080",
            3600,
        ));

        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();

        let a = {
            let service = Arc::clone(&service);
            let token = transfer.claim_token.clone();
            tokio::spawn(async move {
                service.claim(&crypto_claim(&token, "0xaaaaaaaaaaaaaaaa")).await
            })
        };
        let b = {
            let service = Arc::clone(&service);
            let token = transfer.claim_token.clone();
            tokio::spawn(async move {
                service.claim(&crypto_claim(&token, "0xbbbbbbbbbbbbbbbb")).await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ApiError::Conflict(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn fiat_claim_records_recipient_email() {
        let service = service();
        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();

        let claimed = service
            .claim(&ClaimTransferRequest {
                claim_token: transfer.claim_token.clone(),
                payout_method: PayoutMethod::Fiat,
                recipient_address: None,
                recipient_email: Some("payee@example.com".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(claimed.payout_method, Some(PayoutMethod::Fiat));
        assert_eq!(
            claimed.claimed_by_address.as_deref(),
            Some("payee@example.com")
        );
    }

    #[tokio::test]
    async fn send_claim_email_refused_after_claim() {
        let service = service();
        let transfer = service
            .create("sender-1", "0x1234567890abcdef", &create_request(10.0))
            .await
            .unwrap();
        service
            .claim(&crypto_claim(&transfer.claim_token, "0xabcabcabcabcabca"))
            .await
            .unwrap();

        let err = service
            .send_claim_email(&SendClaimEmailRequest {
                transfer_id: transfer.id,
                recipient_email: "payee@example.com".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
