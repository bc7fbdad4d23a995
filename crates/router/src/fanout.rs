//! `FanOutDispatcher`: concurrent dispatch to N providers with per-task
//! timeouts, order-preserving aggregation. Grounded on the teacher's
//! `pool::parallel_generate_multi` (`tokio::spawn` + ordered `JoinHandle`
//! collection), generalized from "N keys of one provider" to "N different
//! providers."

use std::sync::Arc;
use std::time::Duration;

use common::types::ProviderId;
use common::ErrorKind;
use fallback::FallbackEngine;
use provider::{InvokeParams, Message};

#[derive(Debug, Clone)]
pub struct FanOutSlot {
    pub provider: ProviderId,
    pub result: Result<String, ErrorKind>,
}

pub struct FanOutDispatcher {
    engine: Arc<FallbackEngine>,
    per_task_timeout: Duration,
}

impl FanOutDispatcher {
    pub fn new(engine: Arc<FallbackEngine>, per_task_timeout: Duration) -> Self {
        FanOutDispatcher { engine, per_task_timeout }
    }

    /// Launches one task per provider, waits for all with individual
    /// timeouts, and returns results in the same order as `providers`.
    /// A timed-out or panicking task reports `ErrorKind::Timeout`/`Internal`
    /// for its own slot only — never propagated to the others.
    pub async fn dispatch(
        &self,
        providers: &[ProviderId],
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Vec<FanOutSlot> {
        let mut handles = Vec::with_capacity(providers.len());
        for &provider in providers {
            let engine = Arc::clone(&self.engine);
            let messages = messages.to_vec();
            let system_message = system_message.map(|s| s.to_string());
            let params = params.clone();
            let timeout = self.per_task_timeout;

            handles.push(tokio::spawn(async move {
                let call = engine.invoke_named(provider, &messages, system_message.as_deref(), &params);
                match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ErrorKind::Timeout),
                }
            }));
        }

        let mut slots = Vec::with_capacity(handles.len());
        for (provider, handle) in providers.iter().zip(handles) {
            let result = handle.await.unwrap_or(Err(ErrorKind::Internal));
            slots.push(FanOutSlot { provider: *provider, result });
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fallback::ProviderEntry;
    use provider::{ChunkStream, ClientError, InvokeResponse, ProviderClient};
    use std::collections::HashMap;

    struct SlowClient {
        delay: Duration,
        text: &'static str,
    }

    #[async_trait]
    impl ProviderClient for SlowClient {
        fn provider_id(&self) -> &'static str {
            "slow"
        }
        fn rotate_key(&self) {}
        async fn invoke(
            &self,
            _messages: &[Message],
            _system_message: Option<&str>,
            _params: &InvokeParams,
        ) -> Result<InvokeResponse, ClientError> {
            tokio::time::sleep(self.delay).await;
            Ok(InvokeResponse {
                text: self.text.to_string(),
                model: "test".to_string(),
                input_tokens: 1,
                output_tokens: 1,
                latency_ms: self.delay.as_millis() as u64,
            })
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

    fn engine_with(providers: Vec<(ProviderId, Duration)>) -> FallbackEngine {
        let mut entries = HashMap::new();
        for (id, delay) in providers {
            entries.insert(
                id,
                ProviderEntry {
                    client: Arc::new(SlowClient { delay, text: "ok" }),
                    retry_attempts: 0,
                    base_cooldown: Duration::from_millis(10),
                },
            );
        }
        FallbackEngine::new(entries)
    }

    #[tokio::test]
    async fn aggregates_in_requested_order() {
        let engine = Arc::new(engine_with(vec![
            (ProviderId::OpenAi, Duration::from_millis(5)),
            (ProviderId::Anthropic, Duration::from_millis(1)),
        ]));
        let dispatcher = FanOutDispatcher::new(engine, Duration::from_secs(2));
        let messages = vec![Message { role: "user".to_string(), content: "hi".to_string() }];
        let slots = dispatcher
            .dispatch(&[ProviderId::Anthropic, ProviderId::OpenAi], &messages, None, &InvokeParams::default())
            .await;
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].provider, ProviderId::Anthropic);
        assert_eq!(slots[1].provider, ProviderId::OpenAi);
        assert!(slots.iter().all(|s| s.result.is_ok()));
    }

    #[tokio::test]
    async fn slow_provider_times_out_independently() {
        let engine = Arc::new(engine_with(vec![
            (ProviderId::Anthropic, Duration::from_millis(5)),
            (ProviderId::OpenAi, Duration::from_millis(200)),
        ]));
        let dispatcher = FanOutDispatcher::new(engine, Duration::from_millis(30));
        let messages = vec![Message { role: "user".to_string(), content: "hi".to_string() }];
        let slots = dispatcher
            .dispatch(&[ProviderId::Anthropic, ProviderId::OpenAi], &messages, None, &InvokeParams::default())
            .await;
        assert!(slots[0].result.is_ok());
        assert_eq!(slots[1].result, Err(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn unconfigured_provider_reports_error_for_its_slot_only() {
        let engine = Arc::new(engine_with(vec![(ProviderId::Anthropic, Duration::from_millis(1))]));
        let dispatcher = FanOutDispatcher::new(engine, Duration::from_secs(1));
        let messages = vec![Message { role: "user".to_string(), content: "hi".to_string() }];
        let slots = dispatcher
            .dispatch(&[ProviderId::Anthropic, ProviderId::Groq], &messages, None, &InvokeParams::default())
            .await;
        assert!(slots[0].result.is_ok());
        assert!(slots[1].result.is_err());
    }
}
