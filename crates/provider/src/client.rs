//! The `ProviderClient` trait: a uniform abstraction over heterogeneous
//! backend SDKs, generalized from the teacher's `adapters::LLMAdapter`.

use async_trait::async_trait;
use common::ErrorKind;
use std::pin::Pin;
use thiserror::Error;

use crate::types::{InvokeParams, InvokeResponse, Message, StreamChunk};

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ClientError {
            kind,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        ClientError::new(ErrorKind::classify_status(status, body), body.to_string())
    }
}

pub type ChunkStream = Pin<Box<dyn futures::Stream<Item = Result<StreamChunk, ClientError>> + Send>>;

/// Uniform interface over a backend LLM, per spec §4.2.
///
/// Each client owns its `ProviderConfig` and a reference to its
/// `KeyRotator`; on every call it reads the current key rather than
/// caching one.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider_id(&self) -> &'static str;

    /// Advances this client's key rotator. Called by `FallbackEngine` after
    /// a successful call (proactive rotation) or a rate-limit classification.
    fn rotate_key(&self);

    /// Single-shot call returning the full text.
    async fn invoke(
        &self,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<InvokeResponse, ClientError>;

    /// Lazy, finite, non-restartable sequence of text deltas.
    async fn stream(
        &self,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<ChunkStream, ClientError>;

    /// Whether this client can caption images. Most providers can't; the
    /// ones that can override `caption_image` alongside this.
    fn supports_vision(&self) -> bool {
        false
    }

    /// Generates a one-sentence description of an image. Callers must check
    /// `supports_vision` first; the default errors unconditionally.
    async fn caption_image(&self, _image_bytes: &[u8], _mime_type: &str) -> Result<String, ClientError> {
        Err(ClientError::new(
            common::ErrorKind::Internal,
            format!("{} does not support image captioning", self.provider_id()),
        ))
    }
}
