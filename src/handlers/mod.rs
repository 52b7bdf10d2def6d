pub mod cron;
pub mod health;
pub mod payments;
pub mod scheduled;
pub mod settings;
pub mod transfers;
pub mod webhook;

pub use cron::*;
pub use health::*;
pub use payments::*;
pub use scheduled::*;
pub use settings::*;
pub use transfers::*;
pub use webhook::*;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{ScheduledPaymentDriver, TransferService, TxVerifier, WebhookService};
use crate::store::redis_counter::RedisRateLimitStore;
use crate::store::SettingsStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transfers: Arc<TransferService>,
    pub scheduler: Arc<ScheduledPaymentDriver>,
    pub webhooks: Arc<WebhookService>,
    pub settings: Arc<dyn SettingsStore>,
    pub verifier: Arc<dyn TxVerifier>,
    /// None when redis was unreachable at startup; the gate fails open.
    pub redis: Option<Arc<RedisRateLimitStore>>,
}
