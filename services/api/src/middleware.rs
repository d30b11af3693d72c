//! Caller identity extraction
//!
//! Session tokens are validated by the edge gateway, which forwards the
//! authenticated identity in the `x-identity-id` header.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::{error::ApiError, models::Caller};

pub const CALLER_HEADER: &str = "x-identity-id";

/// Read the caller identity from the request headers
pub fn caller_from_request<B>(req: &Request<B>) -> Option<Caller> {
    req.headers()
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Caller::new)
}

/// Reject requests without a caller identity; store it in the extensions otherwise
pub async fn require_caller(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let caller = caller_from_request(&req).ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}
