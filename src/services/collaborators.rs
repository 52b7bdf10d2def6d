//! Outbound collaborator ports. Email delivery and fiat settlement are
//! external systems; the settlement core only needs a seam to hand work to.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Token;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_claim_email(
        &self,
        recipient_email: &str,
        claim_link: &str,
        amount: f64,
        token: Token,
    ) -> Result<()>;
}

#[async_trait]
pub trait FiatSettlement: Send + Sync {
    /// Hands a claimed transfer to the off-ramp provider for fiat payout.
    async fn initiate_payout(
        &self,
        transfer_id: Uuid,
        recipient_email: &str,
        amount: f64,
        token: Token,
    ) -> Result<()>;
}

/// Development stand-in: records the send in the log instead of calling the
/// provider.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_claim_email(
        &self,
        recipient_email: &str,
        claim_link: &str,
        amount: f64,
        token: Token,
    ) -> Result<()> {
        tracing::info!(
            recipient = %recipient_email,
            claim_link = %claim_link,
            amount,
            token = %token,
            "Claim email queued"
        );
        Ok(())
    }
}

/// Development stand-in for the fiat off-ramp provider.
pub struct LogFiatSettlement;

#[async_trait]
impl FiatSettlement for LogFiatSettlement {
    async fn initiate_payout(
        &self,
        transfer_id: Uuid,
        recipient_email: &str,
        amount: f64,
        token: Token,
    ) -> Result<()> {
        tracing::info!(
            transfer_id = %transfer_id,
            recipient = %recipient_email,
            amount,
            token = %token,
            "Fiat payout initiated"
        );
        Ok(())
    }
}
