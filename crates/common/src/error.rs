//! Error classification shared by the fallback engine and every caller
//! that needs to reason about *why* a backend call failed.

use serde::{Deserialize, Serialize};

/// Closed set of failure categories a backend exception is classified into.
///
/// Mirrors the original Python gateway's `ErrorType` enum
/// (`model_fallback.py::ErrorType`) one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiKey,
    Timeout,
    Connection,
    RateLimit,
    ContentPolicy,
    Validation,
    Model,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Human-readable recovery hint, ported from `_get_recovery_strategy`.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorKind::ApiKey => "Check your API key, regenerate if necessary, or verify billing status",
            ErrorKind::Timeout => "Try reducing request complexity or splitting into smaller chunks",
            ErrorKind::Connection => "Check your internet connection or try again later",
            ErrorKind::RateLimit => "Wait and retry later, reduce request frequency, or increase quota limits",
            ErrorKind::ContentPolicy => "Modify your content to comply with the provider's content policies",
            ErrorKind::Validation => "Check input parameters and reduce token length if needed",
            ErrorKind::Model => "Try a different model or verify that the requested model exists",
            ErrorKind::Internal => "Wait and retry later, the provider's service may be experiencing issues",
            ErrorKind::Unknown => "Try again later or switch to a different provider",
        }
    }

    /// Error classes that should skip remaining retries and go straight to
    /// cooldown (spec §4.3 "Classified failure").
    pub fn is_terminal_for_call(&self) -> bool {
        matches!(
            self,
            ErrorKind::ApiKey | ErrorKind::ContentPolicy | ErrorKind::RateLimit
        )
    }

    /// Classify an HTTP status code + response body into an `ErrorKind`.
    ///
    /// Status-code-based classification is preferred where the backend
    /// provides one; string-sniffing (`classify_message`) is the fallback
    /// for providers (Google's REST errors) that return a structured-but-
    /// opaque body with no reliable status code distinction.
    pub fn classify_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ErrorKind::ApiKey,
            408 => ErrorKind::Timeout,
            429 => ErrorKind::RateLimit,
            400 => ErrorKind::Validation,
            404 => ErrorKind::Model,
            451 => ErrorKind::ContentPolicy,
            500..=599 => ErrorKind::Internal,
            _ => Self::classify_message(body),
        }
    }

    /// String-sniffing fallback, ported from `_categorize_error`.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("api key") || lower.contains("api_key") || lower.contains("unauthorized") {
            ErrorKind::ApiKey
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if lower.contains("connection") || lower.contains("connect") {
            ErrorKind::Connection
        } else if lower.contains("content policy") || lower.contains("safety") || lower.contains("blocked") {
            ErrorKind::ContentPolicy
        } else if lower.contains("validation") || lower.contains("invalid argument") {
            ErrorKind::Validation
        } else if lower.contains("429") || lower.contains("rate") || lower.contains("resource_exhausted") || lower.contains("quota") {
            ErrorKind::RateLimit
        } else if lower.contains("function id") || lower.contains("model") || lower.contains("not found") {
            ErrorKind::Model
        } else if lower.contains("internal") || lower.contains("server error") {
            ErrorKind::Internal
        } else {
            ErrorKind::Unknown
        }
    }
}
