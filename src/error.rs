use axum::{
    http::{header::HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::FieldError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited { limit: u32, reset: DateTime<Utc> },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let (status, error_code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        // Full context goes to the log; the client sees a sanitized message.
        let public_message = match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, request_id = %request_id, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let details = match &self {
            ApiError::Validation(errors) => Some(errors.clone()),
            _ => None,
        };

        tracing::warn!(
            error_code = error_code,
            status = status.as_u16(),
            request_id = %request_id,
            "Request failed"
        );

        let body = ErrorResponse {
            success: false,
            error: public_message,
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
            details,
        };

        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { limit, reset } = &self {
            let headers = response.headers_mut();
            if let Ok(v) = limit.to_string().parse() {
                headers.insert(HeaderName::from_static("x-ratelimit-limit"), v);
            }
            if let Ok(v) = "0".parse() {
                headers.insert(HeaderName::from_static("x-ratelimit-remaining"), v);
            }
            if let Ok(v) = reset.to_rfc3339().parse() {
                headers.insert(HeaderName::from_static("x-ratelimit-reset"), v);
            }
        }

        response
    }
}
