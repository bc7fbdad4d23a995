//! Per-identity sliding-window rate limiting, ported from
//! `keyvault::auth::RateLimiter` (a `Mutex<HashMap<caller, Vec<Instant>>>`
//! sliding window) unchanged in shape — only the caller-identity key
//! function is new: the last 12 characters of a validated bearer token,
//! falling back to the client's socket address, per spec §5.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        RateLimiter { windows: Mutex::new(HashMap::new()), max_requests, window: Duration::from_secs(window_secs) }
    }

    /// Returns `Ok(())` if allowed, or `Err(retry_after_secs)`.
    pub fn check(&self, caller: &str) -> Result<(), u64> {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        let timestamps = windows.entry(caller.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }
        timestamps.push(now);
        Ok(())
    }
}

/// Prefers an identity derived from the `Authorization` header (its last
/// 12 characters — enough to distinguish callers without logging full
/// tokens), falling back to the client's socket address.
fn caller_key(request: &Request<Body>) -> String {
    if let Some(header) = request.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let tail_len = header.len().min(12);
        return header[header.len() - tail_len..].to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn enforce(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let caller = caller_key(&request);
    match state.rate_limiter.check(&caller) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let body = serde_json::json!({
                "error": "rate limit exceeded",
                "retry_after": retry_after,
                "suggestions": ["reduce request frequency", "wait before retrying"],
            });
            let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
            response.headers_mut().insert("Retry-After", retry_after.to_string().parse().unwrap());
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_within_limit() {
        let limiter = RateLimiter::new(3, 60);
        assert!(limiter.check("caller-1").is_ok());
        assert!(limiter.check("caller-1").is_ok());
        assert!(limiter.check("caller-1").is_ok());
    }

    #[test]
    fn blocks_over_limit() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check("caller-1").is_ok());
        assert!(limiter.check("caller-1").is_ok());
        assert!(limiter.check("caller-1").is_err());
    }

    #[test]
    fn windows_are_independent_per_caller() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check("caller-1").is_ok());
        assert!(limiter.check("caller-2").is_ok());
        assert!(limiter.check("caller-1").is_err());
    }
}
