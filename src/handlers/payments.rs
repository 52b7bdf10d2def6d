use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::ApiResponse;
use crate::services::TxVerification;
use crate::validation::{is_valid_tx_hash, FieldError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub tx_hash: String,
}

/// Confirms a payment transaction through the chain-verification
/// collaborator. A valid result notifies the merchant's webhook endpoint.
pub async fn verify_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<TxVerification>>, ApiError> {
    if !is_valid_tx_hash(&request.tx_hash) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "txHash",
            "must be 64 hex characters",
        )]));
    }

    let verification = state
        .verifier
        .verify_transaction(&request.tx_hash)
        .await
        .map_err(|e| ApiError::Upstream(format!("Verification failed: {}", e)))?;

    if verification.valid {
        if let Some(merchant_id) = headers.get("x-sender-id").and_then(|v| v.to_str().ok()) {
            state.webhooks.emit(
                merchant_id,
                "payment.completed",
                json!({
                    "txHash": request.tx_hash,
                    "amount": verification.amount,
                    "recipient": verification.recipient,
                }),
            );
        }
    }

    Ok(Json(ApiResponse::new(verification)))
}
