//! `FallbackEngine`: per-provider cooldown tracking, selection ordering,
//! and the retry-with-backoff loop. Grounded on the teacher's
//! `pool::swarm::execute_with_failover` cascade shape and the original
//! Python's `_set_cooldown` formula.

use common::ErrorKind;
use provider::{ClientError, InvokeParams, Message, ProviderClient};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use common::types::ProviderId;

use crate::state::{ProviderLifecycle, ProviderState};

pub struct ProviderEntry {
    pub client: Arc<dyn ProviderClient>,
    pub retry_attempts: u32,
    pub base_cooldown: Duration,
}

#[derive(Debug, Error)]
#[error("all providers exhausted: {0:?}")]
pub struct AggregatedError(pub HashMap<ProviderId, ErrorKind>);

pub struct FallbackEngine {
    entries: HashMap<ProviderId, ProviderEntry>,
    states: HashMap<ProviderId, Mutex<ProviderState>>,
    last_successful: Mutex<Option<ProviderId>>,
}

impl FallbackEngine {
    pub fn new(entries: HashMap<ProviderId, ProviderEntry>) -> Self {
        let states = entries
            .keys()
            .map(|id| (*id, Mutex::new(ProviderState::new(true))))
            .collect();
        FallbackEngine {
            entries,
            states,
            last_successful: Mutex::new(None),
        }
    }

    /// Ordering for a selection attempt: the last successful provider
    /// (if still `READY`), then the fixed preferred ordering filtered to
    /// `READY` providers that have a client configured.
    fn candidate_order(&self, skip: Option<ProviderId>) -> Vec<ProviderId> {
        let now = std::time::Instant::now();
        let is_ready = |id: &ProviderId| -> bool {
            self.entries.contains_key(id)
                && self
                    .states
                    .get(id)
                    .map(|s| s.lock().unwrap().is_ready(now))
                    .unwrap_or(false)
        };

        let mut order = Vec::new();
        if let Some(last) = *self.last_successful.lock().unwrap() {
            if Some(last) != skip && is_ready(&last) {
                order.push(last);
            }
        }
        for id in ProviderId::ALL {
            if Some(id) == skip || order.contains(&id) {
                continue;
            }
            if is_ready(&id) {
                order.push(id);
            }
        }
        order
    }

    fn record_success(&self, id: ProviderId) {
        if let Some(state) = self.states.get(&id) {
            state.lock().unwrap().record_success();
        }
        if let Some(entry) = self.entries.get(&id) {
            entry.client.rotate_key();
        }
        *self.last_successful.lock().unwrap() = Some(id);
    }

    fn record_failure(&self, id: ProviderId, kind: ErrorKind, retries_exhausted: bool) {
        let entry = match self.entries.get(&id) {
            Some(e) => e,
            None => return,
        };
        if let Some(state) = self.states.get(&id) {
            state
                .lock()
                .unwrap()
                .record_failure(kind, entry.base_cooldown, retries_exhausted);
        }
        if kind == ErrorKind::RateLimit {
            entry.client.rotate_key();
        }
    }

    /// Up to `retry_attempts + 1` attempts with `sleep(2^attempt)` between
    /// them. Terminal-for-call error classes (ApiKey, ContentPolicy,
    /// RateLimit) skip remaining retries.
    async fn invoke_with_retry(
        &self,
        id: ProviderId,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<String, ErrorKind> {
        let entry = self.entries.get(&id).expect("candidate came from entries map");
        let mut last_kind = ErrorKind::Unknown;

        for attempt in 0..=entry.retry_attempts {
            match entry.client.invoke(messages, system_message, params).await {
                Ok(resp) => {
                    self.record_success(id);
                    return Ok(resp.text);
                }
                Err(ClientError { kind, .. }) => {
                    last_kind = kind;
                    let is_last_attempt = attempt == entry.retry_attempts;
                    if kind.is_terminal_for_call() || is_last_attempt {
                        self.record_failure(id, kind, true);
                        return Err(kind);
                    }
                    tokio::time::sleep(Duration::from_secs(2u64.saturating_pow(attempt))).await;
                }
            }
        }
        self.record_failure(id, last_kind, true);
        Err(last_kind)
    }

    async fn select_and_invoke(
        &self,
        skip: Option<ProviderId>,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<(ProviderId, String), AggregatedError> {
        let mut attempts = HashMap::new();
        for id in self.candidate_order(skip) {
            match self.invoke_with_retry(id, messages, system_message, params).await {
                Ok(text) => return Ok((id, text)),
                Err(kind) => {
                    attempts.insert(id, kind);
                }
            }
        }
        Err(AggregatedError(attempts))
    }

    /// `get_response`: tries the last successful provider first, then the
    /// fixed preferred ordering.
    pub async fn get_response(
        &self,
        prompt: &str,
        system_message: Option<&str>,
    ) -> Result<(ProviderId, String), AggregatedError> {
        let messages = vec![Message { role: "user".to_string(), content: prompt.to_string() }];
        let params = InvokeParams::default();
        self.select_and_invoke(None, &messages, system_message, &params).await
    }

    /// `get_fallback_response`: identical selection but deliberately skips
    /// a designated-broken primary.
    pub async fn get_fallback_response(
        &self,
        primary: ProviderId,
        prompt: &str,
        system_message: Option<&str>,
    ) -> Result<(ProviderId, String), AggregatedError> {
        let messages = vec![Message { role: "user".to_string(), content: prompt.to_string() }];
        let params = InvokeParams::default();
        self.select_and_invoke(Some(primary), &messages, system_message, &params).await
    }

    /// Streaming variant: selection is identical, but once a provider's
    /// stream is established it is considered chosen — mid-stream failures
    /// are not retried on another provider, since chunks may have already
    /// reached the client.
    pub async fn stream_response(
        &self,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<(ProviderId, provider::ChunkStream), AggregatedError> {
        let mut attempts = HashMap::new();
        for id in self.candidate_order(None) {
            let entry = self.entries.get(&id).expect("candidate came from entries map");
            match entry.client.stream(messages, system_message, params).await {
                Ok(stream) => {
                    self.record_success(id);
                    return Ok((id, stream));
                }
                Err(ClientError { kind, .. }) => {
                    self.record_failure(id, kind, true);
                    attempts.insert(id, kind);
                }
            }
        }
        Err(AggregatedError(attempts))
    }

    /// Invokes a single named provider directly, bypassing candidate
    /// ordering — used by `FanOutDispatcher`, which has already chosen
    /// its provider set. Still honors the provider's cooldown/disabled
    /// state and the normal retry-with-backoff loop.
    pub async fn invoke_named(
        &self,
        id: ProviderId,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<String, ErrorKind> {
        if !self.entries.contains_key(&id) {
            return Err(ErrorKind::Internal);
        }
        let ready = self
            .states
            .get(&id)
            .map(|s| s.lock().unwrap().is_ready(std::time::Instant::now()))
            .unwrap_or(false);
        if !ready {
            return Err(ErrorKind::Unknown);
        }
        self.invoke_with_retry(id, messages, system_message, params).await
    }

    /// Invokes a single named provider's `stream`, bypassing candidate
    /// ordering and fallback cascade entirely — used by the per-provider
    /// direct endpoint (spec §6 `/api/v1/models/{provider}`), which must
    /// surface that provider's own cooldown/disabled state rather than
    /// transparently substituting another provider.
    pub async fn stream_named(
        &self,
        id: ProviderId,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<provider::ChunkStream, ErrorKind> {
        let entry = self.entries.get(&id).ok_or(ErrorKind::Internal)?;
        if self.lifecycle_of(id) != ProviderLifecycle::Ready {
            return Err(ErrorKind::Unknown);
        }
        match entry.client.stream(messages, system_message, params).await {
            Ok(stream) => {
                self.record_success(id);
                Ok(stream)
            }
            Err(ClientError { kind, .. }) => {
                self.record_failure(id, kind, true);
                Err(kind)
            }
        }
    }

    /// Like `stream_response`, but tries `preferred` first if it is
    /// `READY` (the caller's explicit provider hint or scoring-engine
    /// pick), before falling through to the normal candidate order.
    pub async fn stream_response_preferring(
        &self,
        preferred: Option<ProviderId>,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<(ProviderId, provider::ChunkStream), AggregatedError> {
        let mut attempts = HashMap::new();
        if let Some(id) = preferred {
            if self.entries.contains_key(&id) && self.lifecycle_of(id) == ProviderLifecycle::Ready {
                let entry = self.entries.get(&id).expect("checked above");
                match entry.client.stream(messages, system_message, params).await {
                    Ok(stream) => {
                        self.record_success(id);
                        return Ok((id, stream));
                    }
                    Err(ClientError { kind, .. }) => {
                        self.record_failure(id, kind, true);
                        attempts.insert(id, kind);
                    }
                }
            }
        }

        for id in self.candidate_order(preferred) {
            let entry = self.entries.get(&id).expect("candidate came from entries map");
            match entry.client.stream(messages, system_message, params).await {
                Ok(stream) => {
                    self.record_success(id);
                    return Ok((id, stream));
                }
                Err(ClientError { kind, .. }) => {
                    self.record_failure(id, kind, true);
                    attempts.insert(id, kind);
                }
            }
        }
        Err(AggregatedError(attempts))
    }

    pub fn lifecycle_of(&self, id: ProviderId) -> ProviderLifecycle {
        self.states
            .get(&id)
            .map(|s| s.lock().unwrap().lifecycle(std::time::Instant::now()))
            .unwrap_or(ProviderLifecycle::Disabled)
    }

    pub fn last_error_of(&self, id: ProviderId) -> Option<ErrorKind> {
        self.states.get(&id).and_then(|s| s.lock().unwrap().last_error)
    }

    pub fn error_count_of(&self, id: ProviderId) -> u32 {
        self.states.get(&id).map(|s| s.lock().unwrap().error_count).unwrap_or(0)
    }

    /// The provider that most recently completed a successful call, if any
    /// — used by `ScoringEngine`'s `last_used` recency term.
    pub fn last_successful(&self) -> Option<ProviderId> {
        *self.last_successful.lock().unwrap()
    }

    /// Providers this engine has a configured client for.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        self.entries.keys().copied().collect()
    }

    /// Hands out the underlying client for `id`, e.g. so `RelevancePlanner`
    /// can reuse an already-configured provider instead of needing its own.
    pub fn client_for(&self, id: ProviderId) -> Option<Arc<dyn ProviderClient>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.client))
    }

    /// The first configured client that can caption images, in
    /// `ProviderId::ALL` order. `ContextStore` image ingestion needs exactly
    /// one such client; which provider it is doesn't matter.
    pub fn vision_capable_client(&self) -> Option<Arc<dyn ProviderClient>> {
        ProviderId::ALL.iter().find_map(|id| {
            self.entries.get(id).filter(|e| e.client.supports_vision()).map(|e| Arc::clone(&e.client))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use provider::{ChunkStream, InvokeResponse};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        id: &'static str,
        fail_times: AtomicU32,
    }

    #[async_trait]
    impl ProviderClient for FlakyClient {
        fn provider_id(&self) -> &'static str {
            self.id
        }

        fn rotate_key(&self) {}

        async fn invoke(
            &self,
            _messages: &[Message],
            _system_message: Option<&str>,
            _params: &InvokeParams,
        ) -> Result<InvokeResponse, ClientError> {
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ClientError::new(ErrorKind::Timeout, "flaky"))
            } else {
                Ok(InvokeResponse {
                    text: "ok".to_string(),
                    model: "test".to_string(),
                    input_tokens: 1,
                    output_tokens: 1,
                    latency_ms: 1,
                })
            }
        }

        async fn stream(
            &self,
            _messages: &[Message],
            _system_message: Option<&str>,
            _params: &InvokeParams,
        ) -> Result<ChunkStream, ClientError> {
            unimplemented!()
        }
    }

    fn entry(id: &'static str, fail_times: u32, retry_attempts: u32) -> ProviderEntry {
        ProviderEntry {
            client: Arc::new(FlakyClient { id, fail_times: AtomicU32::new(fail_times) }),
            retry_attempts,
            base_cooldown: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn succeeds_after_retry() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 1, 2));
        let engine = FallbackEngine::new(entries);
        let (id, text) = engine.get_response("hi", None).await.unwrap();
        assert_eq!(id, ProviderId::Anthropic);
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn falls_back_to_second_provider() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 10, 0));
        entries.insert(ProviderId::OpenAi, entry("openai", 0, 0));
        let engine = FallbackEngine::new(entries);
        let (id, text) = engine.get_response("hi", None).await.unwrap();
        assert_eq!(id, ProviderId::OpenAi);
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn aggregates_errors_when_all_fail() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 10, 0));
        let engine = FallbackEngine::new(entries);
        let err = engine.get_response("hi", None).await.unwrap_err();
        assert_eq!(err.0.get(&ProviderId::Anthropic), Some(&ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn get_fallback_response_skips_primary() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 0, 0));
        entries.insert(ProviderId::OpenAi, entry("openai", 0, 0));
        let engine = FallbackEngine::new(entries);
        let (id, _) = engine
            .get_fallback_response(ProviderId::Anthropic, "hi", None)
            .await
            .unwrap();
        assert_eq!(id, ProviderId::OpenAi);
    }

    #[tokio::test]
    async fn failed_provider_enters_cooldown() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 10, 0));
        let engine = FallbackEngine::new(entries);
        let _ = engine.get_response("hi", None).await;
        assert_eq!(engine.lifecycle_of(ProviderId::Anthropic), ProviderLifecycle::Cooldown);
    }

    #[test]
    fn vision_capable_client_skips_non_vision_providers() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 0, 0));
        let engine = FallbackEngine::new(entries);
        assert!(engine.vision_capable_client().is_none());
    }

    struct VisionClient;

    #[async_trait]
    impl ProviderClient for VisionClient {
        fn provider_id(&self) -> &'static str {
            "google"
        }

        fn rotate_key(&self) {}

        async fn invoke(&self, _: &[Message], _: Option<&str>, _: &InvokeParams) -> Result<InvokeResponse, ClientError> {
            unimplemented!()
        }

        async fn stream(&self, _: &[Message], _: Option<&str>, _: &InvokeParams) -> Result<ChunkStream, ClientError> {
            unimplemented!()
        }

        fn supports_vision(&self) -> bool {
            true
        }

        async fn caption_image(&self, _: &[u8], _: &str) -> Result<String, ClientError> {
            Ok("a caption".to_string())
        }
    }

    #[tokio::test]
    async fn vision_capable_client_finds_the_configured_vision_provider() {
        let mut entries = HashMap::new();
        entries.insert(ProviderId::Anthropic, entry("anthropic", 0, 0));
        entries.insert(
            ProviderId::Google,
            ProviderEntry { client: Arc::new(VisionClient), retry_attempts: 0, base_cooldown: Duration::from_millis(10) },
        );
        let engine = FallbackEngine::new(entries);
        let client = engine.vision_capable_client().expect("google supports vision");
        let caption = client.caption_image(b"bytes", "image/png").await.unwrap();
        assert_eq!(caption, "a caption");
    }
}
