use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{CreateScheduledPaymentRequest, ScheduledPayment};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantQuery {
    pub merchant_id: String,
}

#[derive(Serialize)]
pub struct ScheduledPaymentResponse {
    pub success: bool,
    pub payment: ScheduledPayment,
}

#[derive(Serialize)]
pub struct ScheduledPaymentListResponse {
    pub success: bool,
    pub payments: Vec<ScheduledPayment>,
}

fn merchant_headers(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let merchant_id = headers
        .get("x-sender-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing x-sender-id header".to_string()))?;
    let merchant_address = headers
        .get("x-sender-address")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing x-sender-address header".to_string()))?;

    Ok((merchant_id.to_string(), merchant_address.to_string()))
}

pub async fn create_scheduled_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateScheduledPaymentRequest>,
) -> Result<Json<ScheduledPaymentResponse>, ApiError> {
    let (merchant_id, merchant_address) = merchant_headers(&headers)?;
    let payment = state
        .scheduler
        .schedule(&merchant_id, &merchant_address, &request)
        .await?;

    Ok(Json(ScheduledPaymentResponse {
        success: true,
        payment,
    }))
}

pub async fn list_scheduled_payments(
    State(state): State<AppState>,
    Query(query): Query<MerchantQuery>,
) -> Result<Json<ScheduledPaymentListResponse>, ApiError> {
    let payments = state.scheduler.list(&query.merchant_id).await?;

    Ok(Json(ScheduledPaymentListResponse {
        success: true,
        payments,
    }))
}
