//! `GatewayError`: the HTTP-facing error taxonomy. Every variant maps to
//! a status code and a JSON body carrying a recovery hint, following the
//! `{error, request_id, support_info}` envelope shape used throughout the
//! original gateway's error responses. `request_id` itself is filled in
//! by `attach_request_id_to_errors` below rather than threaded through
//! every handler, since the value is already available on the response
//! via the `X-Request-ID` header set by `request_id::attach`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn support_info(&self) -> &'static str {
        match self {
            GatewayError::InvalidInput(_) => "check the request payload against the documented schema",
            GatewayError::Unauthorized => "verify the Authorization header carries a configured bearer token",
            GatewayError::NotFound(_) => "verify the resource identifier is correct",
            GatewayError::Internal(_) => "retry later; if it persists, contact support with the request id",
            GatewayError::ProviderUnavailable(_) => "all configured providers are in cooldown, retry later",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "support_info": self.support_info(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Runs after the response is built: for any `>=400` JSON body, splices in
/// `request_id` (read off the `X-Request-ID` header the request-id
/// middleware already set) so every client-visible failure body carries
/// it without every handler needing to thread the value through.
pub async fn attach_request_id_to_errors(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }

    let request_id = response.headers().get("X-Request-ID").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let Some(request_id) = request_id else { return response };

    let (parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    if let Some(object) = value.as_object_mut() {
        object.entry("request_id").or_insert_with(|| serde_json::Value::String(request_id));
    }
    let body = Body::from(serde_json::to_vec(&value).unwrap_or_default());
    Response::from_parts(parts, body)
}
