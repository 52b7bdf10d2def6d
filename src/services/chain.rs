use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const VERIFY_TIMEOUT_SECS: u64 = 15;

/// What the chain collaborator reports about a transaction hash. The core
/// never constructs or signs transactions itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxVerification {
    pub valid: bool,
    pub amount: Option<f64>,
    pub recipient: Option<String>,
    pub reason: String,
}

#[async_trait]
pub trait TxVerifier: Send + Sync {
    async fn verify_transaction(&self, tx_hash: &str) -> Result<TxVerification>;
}

/// Verification via the external verifier endpoint.
pub struct HttpTxVerifier {
    client: reqwest::Client,
    verifier_url: String,
}

impl HttpTxVerifier {
    pub fn new(verifier_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(VERIFY_TIMEOUT_SECS))
            .build()
            .context("Failed to build verifier HTTP client")?;

        Ok(Self {
            client,
            verifier_url: verifier_url.to_string(),
        })
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "txHash")]
    tx_hash: &'a str,
}

#[async_trait]
impl TxVerifier for HttpTxVerifier {
    async fn verify_transaction(&self, tx_hash: &str) -> Result<TxVerification> {
        let response = self
            .client
            .post(format!("{}/verify", self.verifier_url))
            .json(&VerifyRequest { tx_hash })
            .send()
            .await
            .context("Verifier request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Verifier returned HTTP {}", response.status());
        }

        let verification: TxVerification = response
            .json()
            .await
            .context("Invalid verifier response")?;

        tracing::debug!(
            tx_hash = %tx_hash,
            valid = verification.valid,
            "Transaction verification result"
        );

        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_verifier_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/verify")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"valid":true,"amount":10.0,"recipient":"0x1234567890abcdef","reason":"confirmed"}"#)
            .create_async()
            .await;

        let verifier = HttpTxVerifier::new(&server.url()).unwrap();
        let result = verifier
            .verify_transaction(&"a".repeat(64))
            .await
            .unwrap();

        assert!(result.valid);
        assert_eq!(result.recipient.as_deref(), Some("0x1234567890abcdef"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn verifier_http_error_is_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/verify")
            .with_status(503)
            .create_async()
            .await;

        let verifier = HttpTxVerifier::new(&server.url()).unwrap();
        assert!(verifier.verify_transaction(&"a".repeat(64)).await.is_err());
    }
}
