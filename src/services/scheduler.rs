//! Scheduled payment driver: turns due future-dated intents into real
//! transfers. Timer-invoked, one invocation runs to completion and returns a
//! count; the process keeps no scheduler state of its own.
//!
//! Item state machine: pending -> processing -> {completed, failed}. The
//! pending -> processing step is a conditional update, so overlapping
//! invocations cannot double-process a row. A failed item is never
//! re-selected; re-queueing is an external concern.

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    CreateScheduledPaymentRequest, CreateTransferRequest, DeliveryMethod, ProcessRunResult,
    ScheduledPayment, ScheduledStatus,
};
use crate::services::transfers::TransferService;
use crate::store::ScheduledPaymentStore;

pub struct ScheduledPaymentDriver {
    store: Arc<dyn ScheduledPaymentStore>,
    transfers: Arc<TransferService>,
}

impl ScheduledPaymentDriver {
    pub fn new(store: Arc<dyn ScheduledPaymentStore>, transfers: Arc<TransferService>) -> Self {
        Self { store, transfers }
    }

    pub async fn schedule(
        &self,
        merchant_id: &str,
        merchant_address: &str,
        request: &CreateScheduledPaymentRequest,
    ) -> Result<ScheduledPayment, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let payment = ScheduledPayment {
            id: Uuid::new_v4(),
            merchant_id: merchant_id.to_string(),
            merchant_address: merchant_address.to_string(),
            amount: request.amount,
            token: request.token,
            delivery_method: request.delivery_method,
            recipient_email: request.recipient_email.clone(),
            note: request.sanitized_note(),
            scheduled_at: request.scheduled_at,
            status: ScheduledStatus::Pending,
            processed_at: None,
            result_transfer_id: None,
            result_claim_link: None,
            failure_reason: None,
            created_at: Utc::now(),
        };

        self.store
            .insert(payment.clone())
            .await
            .context("Failed to persist scheduled payment")?;

        tracing::info!(
            scheduled_id = %payment.id,
            merchant_id = %merchant_id,
            scheduled_at = %payment.scheduled_at,
            "Payment scheduled"
        );

        Ok(payment)
    }

    pub async fn list(&self, merchant_id: &str) -> Result<Vec<ScheduledPayment>, ApiError> {
        Ok(self
            .store
            .list_by_merchant(merchant_id)
            .await
            .context("Failed to list scheduled payments")?)
    }

    /// One driver invocation: processes every due pending item, earliest
    /// scheduled_at first. Item failures are recorded on the item and never
    /// block siblings; there is no cross-item transaction.
    pub async fn run_once(&self) -> Result<ProcessRunResult, ApiError> {
        let now = Utc::now();
        let due = self
            .store
            .due_pending(now)
            .await
            .context("Failed to select due payments")?;

        if due.is_empty() {
            return Ok(ProcessRunResult {
                success: true,
                processed: 0,
            });
        }

        tracing::info!(count = due.len(), "Processing due scheduled payments");

        let mut processed = 0;
        for payment in due {
            // Lost to a concurrent invocation; that run owns the item now.
            let acquired = self
                .store
                .begin_processing(payment.id)
                .await
                .context("Failed to dequeue scheduled payment")?;
            if !acquired {
                tracing::debug!(scheduled_id = %payment.id, "Item taken by another run");
                continue;
            }

            match self.process_item(&payment).await {
                Ok(()) => {}
                Err(e) => {
                    tracing::error!(
                        scheduled_id = %payment.id,
                        error = %e,
                        "Scheduled payment failed"
                    );
                }
            }
            processed += 1;
        }

        Ok(ProcessRunResult {
            success: true,
            processed,
        })
    }

    async fn process_item(&self, payment: &ScheduledPayment) -> Result<(), ApiError> {
        let request = CreateTransferRequest {
            amount: payment.amount,
            token: payment.token,
            recipient_email: payment.recipient_email.clone(),
            note: payment.note.clone(),
            send_email: payment.delivery_method == DeliveryMethod::Email,
        };

        let now = Utc::now();
        match self
            .transfers
            .create(&payment.merchant_id, &payment.merchant_address, &request)
            .await
        {
            Ok(transfer) => {
                self.store
                    .mark_completed(payment.id, transfer.id, &transfer.claim_link, now)
                    .await
                    .context("Failed to record completion")?;

                tracing::info!(
                    scheduled_id = %payment.id,
                    transfer_id = %transfer.id,
                    "Scheduled payment completed"
                );
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.store
                    .mark_failed(payment.id, &reason, now)
                    .await
                    .context("Failed to record failure")?;
                Err(ApiError::Upstream(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;
    use crate::services::collaborators::{LogEmailSender, LogFiatSettlement};
    use crate::services::webhook::{WebhookConfig, WebhookService};
    use crate::store::memory::{
        MemoryScheduledPaymentStore, MemorySettingsStore, MemoryTransferStore,
        MemoryWebhookLogStore,
    };
    use crate::store::TransferStore;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    struct Fixture {
        driver: ScheduledPaymentDriver,
        scheduled: Arc<MemoryScheduledPaymentStore>,
        transfers: Arc<MemoryTransferStore>,
    }

    fn fixture() -> Fixture {
        let transfers_store = Arc::new(MemoryTransferStore::new());
        let scheduled_store = Arc::new(MemoryScheduledPaymentStore::new());
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
        let transfer_service = Arc::new(TransferService::new(
            transfers_store.clone() as Arc<dyn TransferStore>,
            webhooks,
            Arc::new(LogEmailSender),
            Arc::new(LogFiatSettlement),
            "http://localhost:8080",
            3600,
        ));

        Fixture {
            driver: ScheduledPaymentDriver::new(scheduled_store.clone(), transfer_service),
            scheduled: scheduled_store,
            transfers: transfers_store,
        }
    }

    async fn insert_due(
        fixture: &Fixture,
        amount: f64,
        minutes_ago: i64,
    ) -> ScheduledPayment {
        let payment = ScheduledPayment {
            id: Uuid::new_v4(),
            merchant_id: "merchant-1".to_string(),
            merchant_address: "0x1234567890abcdef".to_string(),
            amount,
            token: Token::Flow,
            delivery_method: DeliveryMethod::Link,
            recipient_email: None,
            note: None,
            scheduled_at: Utc::now() - Duration::minutes(minutes_ago),
            status: ScheduledStatus::Pending,
            processed_at: None,
            result_transfer_id: None,
            result_claim_link: None,
            failure_reason: None,
            created_at: Utc::now(),
        };
        fixture.scheduled.insert(payment.clone()).await.unwrap();
        payment
    }

    #[tokio::test]
    async fn due_payment_completes_with_real_transfer() {
        let fixture = fixture();
        let payment = insert_due(&fixture, 10.0, 1).await;

        let result = fixture.driver.run_once().await.unwrap();
        assert!(result.success);
        assert_eq!(result.processed, 1);

        let row = fixture
            .scheduled
            .find_by_id(payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, ScheduledStatus::Completed);
        assert!(row.processed_at.is_some());

        let transfer_id = row.result_transfer_id.unwrap();
        let transfer = fixture
            .transfers
            .find_by_id(transfer_id)
            .await
            .unwrap()
            .expect("result_transfer_id must point at a real transfer");
        assert_eq!(transfer.claim_link, row.result_claim_link.unwrap());
    }

    #[tokio::test]
    async fn items_processed_earliest_due_first() {
        let fixture = fixture();
        // inserted out of order: 09:00, 09:05, 08:59 relative to each other
        insert_due(&fixture, 2.0, 5).await;
        insert_due(&fixture, 3.0, 0).await;
        insert_due(&fixture, 1.0, 6).await;

        let due = fixture.scheduled.due_pending(Utc::now()).await.unwrap();
        let amounts: Vec<f64> = due.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);

        let result = fixture.driver.run_once().await.unwrap();
        assert_eq!(result.processed, 3);
    }

    #[tokio::test]
    async fn future_items_are_not_selected() {
        let fixture = fixture();
        insert_due(&fixture, 5.0, -60).await; // one hour from now

        let result = fixture.driver.run_once().await.unwrap();
        assert_eq!(result.processed, 0);
    }

    #[tokio::test]
    async fn one_bad_item_does_not_block_siblings() {
        let fixture = fixture();
        let bad = insert_due(&fixture, -1.0, 3).await; // invalid amount
        let good = insert_due(&fixture, 10.0, 2).await;

        let result = fixture.driver.run_once().await.unwrap();
        assert!(result.success);
        assert_eq!(result.processed, 2);

        let bad_row = fixture.scheduled.find_by_id(bad.id).await.unwrap().unwrap();
        assert_eq!(bad_row.status, ScheduledStatus::Failed);
        assert!(bad_row.failure_reason.is_some());

        let good_row = fixture.scheduled.find_by_id(good.id).await.unwrap().unwrap();
        assert_eq!(good_row.status, ScheduledStatus::Completed);
    }

    #[tokio::test]
    async fn failed_items_are_not_retried_on_next_run() {
        let fixture = fixture();
        let bad = insert_due(&fixture, -1.0, 3).await;

        fixture.driver.run_once().await.unwrap();
        let second = fixture.driver.run_once().await.unwrap();
        assert_eq!(second.processed, 0);

        let row = fixture.scheduled.find_by_id(bad.id).await.unwrap().unwrap();
        assert_eq!(row.status, ScheduledStatus::Failed);
    }

    #[tokio::test]
    async fn email_delivery_schedules_with_send_email() {
        let fixture = fixture();
        let payment = ScheduledPayment {
            recipient_email: Some("payee@example.com".to_string()),
            delivery_method: DeliveryMethod::Email,
            ..insert_due(&fixture, 7.0, 1).await
        };
        fixture.scheduled.insert(payment.clone()).await.unwrap();

        let result = fixture.driver.run_once().await.unwrap();
        assert_eq!(result.processed, 1);

        let row = fixture
            .scheduled
            .find_by_id(payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, ScheduledStatus::Completed);
    }
}
