use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::ApiError;
use crate::store::RateLimitStore;

/// Independent sliding-window buckets. Mutating payment operations get the
/// tightest budget; reads of claim links the loosest of the scoped ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBucket {
    General,
    Payments,
    PaymentLinks,
    Webhooks,
    Settings,
}

impl RateBucket {
    pub fn limit(&self) -> u32 {
        match self {
            RateBucket::General => 100,
            RateBucket::Payments => 10,
            RateBucket::PaymentLinks => 30,
            RateBucket::Webhooks => 50,
            RateBucket::Settings => 20,
        }
    }

    pub fn window_secs(&self) -> u64 {
        60
    }

    fn key_name(&self) -> &'static str {
        match self {
            RateBucket::General => "general",
            RateBucket::Payments => "payments",
            RateBucket::PaymentLinks => "payment_links",
            RateBucket::Webhooks => "webhooks",
            RateBucket::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: DateTime<Utc>,
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, identity: &str, bucket: RateBucket) -> RateLimitDecision {
        let limit = bucket.limit();
        let window = bucket.window_secs();
        let key = format!("ratelimit:{}:{}", bucket.key_name(), identity);

        match self.store.incr_window(&key, window).await {
            Ok((count, ttl)) => {
                let reset = Utc::now() + Duration::seconds(ttl as i64);
                RateLimitDecision {
                    allowed: count <= limit as u64,
                    limit,
                    remaining: (limit as i64 - count as i64).max(0) as u32,
                    reset,
                }
            }
            Err(e) => {
                // Fail open: an unreachable counter store must not take the
                // API down with it. The degradation is loud in the logs.
                tracing::warn!(
                    bucket = bucket.key_name(),
                    error = %e,
                    "Rate limit store unreachable, allowing request"
                );
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset: Utc::now() + Duration::seconds(window as i64),
                }
            }
        }
    }
}

/// Caller identity for rate limiting: first proxy-forwarded address found,
/// else a shared "unknown" bucket. Clients behind the same NAT collapse into
/// one identity; known weak point, kept deliberately.
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    for header in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(header).and_then(|v| v.to_str().ok()) {
            if !ip.trim().is_empty() {
                return ip.trim().to_string();
            }
        }
    }
    "unknown".to_string()
}

/// Axum middleware: rejects over-limit callers with 429 and stamps the
/// X-RateLimit-* headers on every response, allowed or not.
pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    bucket: RateBucket,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = client_identity(request.headers());
    let decision = limiter.check(&identity, bucket).await;

    if !decision.allowed {
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            reset: decision.reset,
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(v) = decision.limit.to_string().parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), v);
    }
    if let Ok(v) = decision.remaining.to_string().parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), v);
    }
    if let Ok(v) = decision.reset.to_rfc3339().parse() {
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), v);
    }

    Ok(response)
}
