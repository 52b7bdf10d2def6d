use axum::{extract::State, Json};
use chrono::Utc;

use crate::handlers::AppState;
use crate::models::HealthStatus;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let redis_ok = match &state.redis {
        Some(redis) => redis.ping().await,
        None => false,
    };

    // Rate limiting fails open, so a dead redis degrades rather than kills.
    let status = if redis_ok { "healthy" } else { "degraded" };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        redis: redis_ok,
        timestamp: Utc::now(),
    })
}
