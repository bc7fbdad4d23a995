//! Bearer-token auth middleware: a config-supplied static token compared
//! in constant time. Reworked from `keyvault::auth::AuthGuard` — that
//! guard reconciles a Keychain-backed token; this port drops the
//! Keychain/file-reconciliation machinery (no macOS Keychain in a server
//! deployment) and keeps only the constant-time comparison core, fed by
//! the configured `bearer_tokens` list.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::GatewayError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Paths exempt from bearer auth per spec §6: health check and docs.
const EXEMPT_PATHS: &[&str] = &["/health", "/docs", "/openapi.json"];

fn constant_time_eq(a: &str, b: &str) -> bool {
    let key = b"gateway-constant-time-comparison-key";
    let mut mac_a = HmacSha256::new_from_slice(key).expect("static key");
    let mut mac_b = HmacSha256::new_from_slice(key).expect("static key");
    mac_a.update(a.as_bytes());
    mac_b.update(b.as_bytes());
    mac_a.finalize().into_bytes() == mac_b.finalize().into_bytes()
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

pub async fn require_bearer(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let authorized = match header {
        Some(value) => state.config.bearer_tokens.iter().any(|t| constant_time_eq(value, &format!("Bearer {t}"))),
        None => false,
    };

    if authorized {
        next.run(request).await
    } else {
        GatewayError::Unauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_identical_strings() {
        assert!(constant_time_eq("Bearer abc123", "Bearer abc123"));
    }

    #[test]
    fn constant_time_eq_rejects_different_strings() {
        assert!(!constant_time_eq("Bearer abc123", "Bearer abc124"));
    }

    #[test]
    fn health_and_docs_are_exempt() {
        assert!(is_exempt("/health"));
        assert!(is_exempt("/docs"));
        assert!(!is_exempt("/enhance/stream"));
    }
}
