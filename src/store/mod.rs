pub mod memory;
pub mod redis_counter;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    MerchantSettings, PayoutMethod, ScheduledPayment, Transfer, WebhookLog,
};

#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert(&self, transfer: Transfer) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transfer>>;
    async fn find_by_claim_token(&self, claim_token: &str) -> Result<Option<Transfer>>;
    async fn list_by_sender(&self, sender_id: &str) -> Result<Vec<Transfer>>;

    /// Conditional update: transitions the row to claimed only if it is
    /// still pending. Returns the updated row, or None if the row was not
    /// pending (lost race, already terminal). This is the at-most-one-claim
    /// guarantee; callers check expiry before calling.
    async fn claim_if_pending(
        &self,
        claim_token: &str,
        claimed_by_address: &str,
        payout_method: PayoutMethod,
        now: DateTime<Utc>,
    ) -> Result<Option<Transfer>>;
}

#[async_trait]
pub trait ScheduledPaymentStore: Send + Sync {
    async fn insert(&self, payment: ScheduledPayment) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledPayment>>;
    async fn list_by_merchant(&self, merchant_id: &str) -> Result<Vec<ScheduledPayment>>;

    /// Pending rows due at or before `now`, earliest scheduled_at first.
    async fn due_pending(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPayment>>;

    /// Conditional pending -> processing transition. Returns false if the
    /// row was no longer pending, so overlapping driver invocations cannot
    /// double-process an item.
    async fn begin_processing(&self, id: Uuid) -> Result<bool>;

    async fn mark_completed(
        &self,
        id: Uuid,
        transfer_id: Uuid,
        claim_link: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_failed(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    async fn append(&self, log: WebhookLog) -> Result<()>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WebhookLog>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, merchant_id: &str) -> Result<Option<MerchantSettings>>;
    async fn upsert(&self, settings: MerchantSettings) -> Result<()>;
}

/// Shared counter behind the rate limiter. Lives in an external store so
/// limits hold across horizontally scaled instances.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically increments the counter for `key`, starting a window of
    /// `window_secs` on first increment. Returns (count, seconds until the
    /// window resets).
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<(u64, u64)>;
}
