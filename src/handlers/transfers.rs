use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{
    ClaimTransferRequest, CreateTransferRequest, SendClaimEmailRequest, Transfer, TransferPublic,
};

#[derive(Serialize)]
pub struct TransferResponse {
    pub success: bool,
    pub transfer: Transfer,
}

#[derive(Serialize)]
pub struct TransferListResponse {
    pub success: bool,
    pub transfers: Vec<Transfer>,
}

#[derive(Serialize)]
pub struct TransferPublicResponse {
    pub success: bool,
    pub transfer: TransferPublic,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderQuery {
    pub sender_id: String,
}

fn sender_headers(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let sender_id = headers
        .get("x-sender-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing x-sender-id header".to_string()))?;
    let sender_address = headers
        .get("x-sender-address")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing x-sender-address header".to_string()))?;

    Ok((sender_id.to_string(), sender_address.to_string()))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let (sender_id, sender_address) = sender_headers(&headers)?;
    let transfer = state
        .transfers
        .create(&sender_id, &sender_address, &request)
        .await?;

    Ok(Json(TransferResponse {
        success: true,
        transfer,
    }))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<SenderQuery>,
) -> Result<Json<TransferListResponse>, ApiError> {
    let transfers = state.transfers.list_by_sender(&query.sender_id).await?;

    Ok(Json(TransferListResponse {
        success: true,
        transfers,
    }))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(claim_token): Path<String>,
) -> Result<Json<TransferPublicResponse>, ApiError> {
    let transfer = state.transfers.get_details(&claim_token).await?;

    Ok(Json(TransferPublicResponse {
        success: true,
        transfer,
    }))
}

pub async fn claim_transfer(
    State(state): State<AppState>,
    Json(request): Json<ClaimTransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer = state.transfers.claim(&request).await?;

    Ok(Json(TransferResponse {
        success: true,
        transfer,
    }))
}

#[derive(Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
}

pub async fn send_claim_email(
    State(state): State<AppState>,
    Json(request): Json<SendClaimEmailRequest>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    state.transfers.send_claim_email(&request).await?;
    Ok(Json(SendEmailResponse { success: true }))
}
