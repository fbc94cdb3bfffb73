use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// The token of an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "))
}

/// Compares without short-circuiting on the first differing byte.
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Whether the request carries the configured admin token. With no token
/// configured nobody is authorized.
pub fn is_authorized(headers: &HeaderMap, expected_token: &str) -> bool {
    if expected_token.is_empty() {
        return false;
    }
    match bearer_token(headers) {
        Some(provided) => constant_time_eq(provided.as_bytes(), expected_token.as_bytes()),
        None => false,
    }
}

/// Rejects requests without a valid admin token with 401.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    if !is_authorized(req.headers(), &state.config.admin.token) {
        state.metrics.inc_auth_failures();
        tracing::debug!(path = %req.uri().path(), "Rejected unauthenticated admin request");
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    const TOKEN: &str = "0123456789abcdef-token";

    #[test]
    fn test_exact_token_required() {
        assert!(is_authorized(&headers(&format!("Bearer {}", TOKEN)), TOKEN));
        assert!(!is_authorized(&headers(&format!("Bearer {}x", TOKEN)), TOKEN));
        assert!(!is_authorized(&headers(TOKEN), TOKEN));
        assert!(!is_authorized(&headers(&format!("bearer {}", TOKEN)), TOKEN));
        assert!(!is_authorized(&HeaderMap::new(), TOKEN));
    }

    #[test]
    fn test_fails_closed_without_configured_token() {
        assert!(!is_authorized(&headers("Bearer "), ""));
        assert!(!is_authorized(&headers("Bearer anything"), ""));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
