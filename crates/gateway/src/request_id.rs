//! `X-Request-ID` middleware: echoes a client-supplied header or
//! generates one, and attaches it to the request's extensions so handlers
//! and the tracing span can pick it up.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

#[derive(Clone)]
pub struct RequestId(pub String);

pub async fn attach(mut request: Request<Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(common::new_request_id);

    request.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!("request", request_id = %id);
    let _guard = span.enter();

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}
