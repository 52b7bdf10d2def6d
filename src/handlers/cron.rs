use axum::{extract::State, http::HeaderMap, Json};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::ProcessRunResult;

/// Timer-invoked entry point for the scheduled payment driver. Gated by the
/// cron bearer secret like every other cron surface.
pub async fn process_scheduled(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProcessRunResult>, ApiError> {
    check_cron_bearer(&headers, &state.config.cron_secret)?;

    let result = state.scheduler.run_once().await?;

    tracing::info!(processed = result.processed, "Cron run finished");
    Ok(Json(result))
}

fn check_cron_bearer(headers: &HeaderMap, secret: &str) -> Result<(), ApiError> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = authorization
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected bearer token".to_string()))?;

    if token != secret {
        return Err(ApiError::Unauthorized("Invalid cron secret".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_must_match_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer the-cron-secret-value"),
        );
        assert!(check_cron_bearer(&headers, "the-cron-secret-value").is_ok());
        assert!(check_cron_bearer(&headers, "different-secret").is_err());
    }

    #[test]
    fn missing_or_malformed_authorization_rejected() {
        assert!(check_cron_bearer(&HeaderMap::new(), "s").is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(check_cron_bearer(&headers, "s").is_err());
    }
}
