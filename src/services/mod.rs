pub mod chain;
pub mod collaborators;
pub mod scheduler;
pub mod transfers;
pub mod webhook;

pub use chain::{HttpTxVerifier, TxVerification, TxVerifier};
pub use collaborators::{EmailSender, FiatSettlement, LogEmailSender, LogFiatSettlement};
pub use scheduler::ScheduledPaymentDriver;
pub use transfers::TransferService;
pub use webhook::{WebhookConfig, WebhookService};
