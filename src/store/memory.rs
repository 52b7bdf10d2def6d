//! In-memory store implementations backing local runs and tests. The
//! production deployment swaps these for the relational persistence
//! collaborator behind the same traits.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    MerchantSettings, PayoutMethod, ScheduledPayment, ScheduledStatus, Transfer, TransferStatus,
    WebhookLog,
};
use crate::store::{
    RateLimitStore, ScheduledPaymentStore, SettingsStore, TransferStore, WebhookLogStore,
};

#[derive(Default)]
pub struct MemoryTransferStore {
    rows: RwLock<HashMap<Uuid, Transfer>>,
    by_token: RwLock<HashMap<String, Uuid>>,
}

impl MemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for MemoryTransferStore {
    async fn insert(&self, transfer: Transfer) -> Result<()> {
        let mut by_token = self.by_token.write().await;
        if by_token.contains_key(&transfer.claim_token) {
            bail!("claim token already exists");
        }
        by_token.insert(transfer.claim_token.clone(), transfer.id);
        self.rows.write().await.insert(transfer.id, transfer);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transfer>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_claim_token(&self, claim_token: &str) -> Result<Option<Transfer>> {
        let by_token = self.by_token.read().await;
        let Some(id) = by_token.get(claim_token) else {
            return Ok(None);
        };
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn list_by_sender(&self, sender_id: &str) -> Result<Vec<Transfer>> {
        let mut transfers: Vec<Transfer> = self
            .rows
            .read()
            .await
            .values()
            .filter(|t| t.sender_id == sender_id)
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transfers)
    }

    async fn claim_if_pending(
        &self,
        claim_token: &str,
        claimed_by_address: &str,
        payout_method: PayoutMethod,
        now: DateTime<Utc>,
    ) -> Result<Option<Transfer>> {
        // Single write lock covers check and mutate, which is what the
        // conditional UPDATE gives the relational implementation.
        let by_token = self.by_token.read().await;
        let Some(id) = by_token.get(claim_token).copied() else {
            return Ok(None);
        };
        drop(by_token);

        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if row.status != TransferStatus::Pending {
            return Ok(None);
        }

        row.status = TransferStatus::Claimed;
        row.claimed_at = Some(now);
        row.claimed_by_address = Some(claimed_by_address.to_string());
        row.payout_method = Some(payout_method);
        Ok(Some(row.clone()))
    }
}

#[derive(Default)]
pub struct MemoryScheduledPaymentStore {
    rows: RwLock<HashMap<Uuid, ScheduledPayment>>,
}

impl MemoryScheduledPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduledPaymentStore for MemoryScheduledPaymentStore {
    async fn insert(&self, payment: ScheduledPayment) -> Result<()> {
        self.rows.write().await.insert(payment.id, payment);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduledPayment>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_by_merchant(&self, merchant_id: &str) -> Result<Vec<ScheduledPayment>> {
        let mut payments: Vec<ScheduledPayment> = self
            .rows
            .read()
            .await
            .values()
            .filter(|p| p.merchant_id == merchant_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(payments)
    }

    async fn due_pending(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPayment>> {
        let mut due: Vec<ScheduledPayment> = self
            .rows
            .read()
            .await
            .values()
            .filter(|p| p.status == ScheduledStatus::Pending && p.scheduled_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(due)
    }

    async fn begin_processing(&self, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.status != ScheduledStatus::Pending {
            return Ok(false);
        }
        row.status = ScheduledStatus::Processing;
        Ok(true)
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        transfer_id: Uuid,
        claim_link: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            bail!("scheduled payment {} not found", id);
        };
        if row.status != ScheduledStatus::Processing {
            bail!("scheduled payment {} is not processing", id);
        }
        row.status = ScheduledStatus::Completed;
        row.processed_at = Some(now);
        row.result_transfer_id = Some(transfer_id);
        row.result_claim_link = Some(claim_link.to_string());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            bail!("scheduled payment {} not found", id);
        };
        if row.status != ScheduledStatus::Processing {
            bail!("scheduled payment {} is not processing", id);
        }
        row.status = ScheduledStatus::Failed;
        row.processed_at = Some(now);
        row.failure_reason = Some(reason.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWebhookLogStore {
    rows: RwLock<Vec<WebhookLog>>,
}

impl MemoryWebhookLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookLogStore for MemoryWebhookLogStore {
    async fn append(&self, log: WebhookLog) -> Result<()> {
        self.rows.write().await.push(log);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WebhookLog>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    rows: RwLock<HashMap<String, MerchantSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, merchant_id: &str) -> Result<Option<MerchantSettings>> {
        Ok(self.rows.read().await.get(merchant_id).cloned())
    }

    async fn upsert(&self, settings: MerchantSettings) -> Result<()> {
        self.rows
            .write()
            .await
            .insert(settings.merchant_id.clone(), settings);
        Ok(())
    }
}

/// Test-only counter store. Production always uses the redis-backed store;
/// an in-process map cannot hold limits across instances.
pub struct MemoryRateLimitStore {
    counters: RwLock<HashMap<String, (u64, DateTime<Utc>)>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<(u64, u64)> {
        let now = Utc::now();
        let mut counters = self.counters.write().await;
        let entry = counters
            .entry(key.to_string())
            .or_insert((0, now + chrono::Duration::seconds(window_secs as i64)));

        if entry.1 <= now {
            *entry = (0, now + chrono::Duration::seconds(window_secs as i64));
        }
        entry.0 += 1;

        let ttl = (entry.1 - now).num_seconds().max(0) as u64;
        Ok((entry.0, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;

    fn pending_transfer(token: &str) -> Transfer {
        let now = Utc::now();
        Transfer {
            id: Uuid::new_v4(),
            sender_id: "sender-1".to_string(),
            sender_address: "0x1234567890abcdef".to_string(),
            recipient_email: None,
            amount: 5.0,
            token: Token::Flow,
            note: None,
            status: TransferStatus::Pending,
            claim_token: token.to_string(),
            claim_link: format!("http://localhost/claim/{}", token),
            expires_at: now + chrono::Duration::days(7),
            created_at: now,
            claimed_at: None,
            claimed_by_address: None,
            payout_method: None,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_claim_tokens() {
        let store = MemoryTransferStore::new();
        store.insert(pending_transfer("tok-1")).await.unwrap();
        assert!(store.insert(pending_transfer("tok-1")).await.is_err());
    }

    #[tokio::test]
    async fn claim_if_pending_is_single_shot() {
        let store = MemoryTransferStore::new();
        store.insert(pending_transfer("tok-2")).await.unwrap();

        let first = store
            .claim_if_pending("tok-2", "0xaaaaaaaaaaaaaaaa", PayoutMethod::Crypto, Utc::now())
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .claim_if_pending("tok-2", "0xbbbbbbbbbbbbbbbb", PayoutMethod::Crypto, Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn scheduled_status_path_is_strict() {
        let store = MemoryScheduledPaymentStore::new();
        let id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert(ScheduledPayment {
                id,
                merchant_id: "m1".to_string(),
                merchant_address: "0x1234567890abcdef".to_string(),
                amount: 1.0,
                token: Token::Usdc,
                delivery_method: crate::models::DeliveryMethod::Link,
                recipient_email: None,
                note: None,
                scheduled_at: now,
                status: ScheduledStatus::Pending,
                processed_at: None,
                result_transfer_id: None,
                result_claim_link: None,
                failure_reason: None,
                created_at: now,
            })
            .await
            .unwrap();

        // completing without processing first is a bug
        assert!(store
            .mark_completed(id, Uuid::new_v4(), "link", now)
            .await
            .is_err());

        assert!(store.begin_processing(id).await.unwrap());
        // second dequeue loses
        assert!(!store.begin_processing(id).await.unwrap());

        store.mark_completed(id, Uuid::new_v4(), "link", now).await.unwrap();
    }

    #[tokio::test]
    async fn memory_counter_resets_after_window() {
        let store = MemoryRateLimitStore::new();
        let (count, _) = store.incr_window("k", 60).await.unwrap();
        assert_eq!(count, 1);
        let (count, ttl) = store.incr_window("k", 60).await.unwrap();
        assert_eq!(count, 2);
        assert!(ttl <= 60);
    }
}
