use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// CSRF defense for browser-originated mutations: every non-GET request must
/// carry an Origin whose host matches the Host header. GET is exempt.
pub async fn same_origin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.method() != Method::GET {
        check_same_origin(request.headers())?;
    }
    Ok(next.run(request).await)
}

fn check_same_origin(headers: &HeaderMap) -> Result<(), ApiError> {
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Forbidden("Missing Origin header".to_string()))?;

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Forbidden("Missing Host header".to_string()))?;

    let origin_host = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(origin);

    if origin_host != host {
        tracing::warn!(origin = %origin, host = %host, "Cross-origin request rejected");
        return Err(ApiError::Forbidden("Cross-origin request denied".to_string()));
    }

    Ok(())
}
