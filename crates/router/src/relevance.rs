//! `RelevancePlanner`: asks an LLM to score the available context sources
//! for a prompt. No teacher counterpart — built in the teacher's
//! `serde_json::json!`-literal-payload idiom (`pool/mod.rs`,
//! `server/mod.rs`) since nothing in the pack does structured-output
//! scoring.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use common::types::{OverallStrategy, RelevanceReport};
use provider::{InvokeParams, Message, ProviderClient};

/// Threshold above which a source is gathered in Phase 3 and counted as used.
pub const RELEVANCE_THRESHOLD: f64 = 0.6;

const SYSTEM_PROMPT: &str = "You are a relevance-planning assistant for a prompt-enhancement \
pipeline. Given a user prompt and a catalog of available context sources, respond with a single \
JSON object: {\"scores\": {source: float in [0,1]}, \"reasoning\": {source: string}, \
\"overall_strategy\": one of \"minimal\"|\"standard\"|\"enriched\"|\"comprehensive\"}. Score how \
useful each source would be for answering the prompt well. Respond with JSON only, no prose.";

#[derive(serde::Deserialize)]
struct PlannerOutput {
    #[serde(default)]
    scores: HashMap<String, f64>,
    #[serde(default)]
    reasoning: HashMap<String, String>,
    #[serde(default)]
    overall_strategy: Option<String>,
}

fn parse_strategy(s: Option<&str>) -> OverallStrategy {
    match s {
        Some("minimal") => OverallStrategy::Minimal,
        Some("enriched") => OverallStrategy::Enriched,
        Some("comprehensive") => OverallStrategy::Comprehensive,
        _ => OverallStrategy::Standard,
    }
}

fn degraded_report(sources: &HashMap<String, String>) -> RelevanceReport {
    RelevanceReport {
        scores: sources.keys().map(|s| (s.clone(), 0.5)).collect(),
        reasoning: sources.keys().map(|s| (s.clone(), "degraded: planner unavailable".to_string())).collect(),
        overall_strategy: OverallStrategy::Standard,
        sources_used: HashSet::new(),
    }
}

pub struct RelevancePlanner {
    client: Arc<dyn ProviderClient>,
    timeout: Duration,
}

impl RelevancePlanner {
    pub fn new(client: Arc<dyn ProviderClient>, timeout: Duration) -> Self {
        RelevancePlanner { client, timeout }
    }

    /// `available_sources`: source name → human-readable description.
    pub async fn plan(&self, prompt: &str, available_sources: &HashMap<String, String>) -> RelevanceReport {
        let catalog: String = available_sources
            .iter()
            .map(|(name, desc)| format!("- {name}: {desc}"))
            .collect::<Vec<_>>()
            .join("\n");
        let user_message = format!("Prompt: {prompt}\n\nAvailable sources:\n{catalog}");
        let messages = vec![Message { role: "user".to_string(), content: user_message }];
        let params = InvokeParams::default();

        let call = self.client.invoke(&messages, Some(SYSTEM_PROMPT), &params);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(resp)) => resp.text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "relevance planner call failed, using degraded report");
                return degraded_report(available_sources);
            }
            Err(_) => {
                tracing::warn!("relevance planner timed out, using degraded report");
                return degraded_report(available_sources);
            }
        };

        let parsed: PlannerOutput = match extract_json(&response).and_then(|j| serde_json::from_str(&j).ok()) {
            Some(p) => p,
            None => {
                tracing::warn!("relevance planner returned unparseable output, using degraded report");
                return degraded_report(available_sources);
            }
        };

        let mut scores = HashMap::new();
        let mut reasoning = HashMap::new();
        let mut sources_used = HashSet::new();
        for name in available_sources.keys() {
            let score = parsed.scores.get(name).copied().unwrap_or(0.0).clamp(0.0, 1.0);
            scores.insert(name.clone(), score);
            if let Some(r) = parsed.reasoning.get(name) {
                reasoning.insert(name.clone(), r.clone());
            }
            if score > RELEVANCE_THRESHOLD {
                sources_used.insert(name.clone());
            }
        }

        RelevanceReport {
            scores,
            reasoning,
            overall_strategy: parse_strategy(parsed.overall_strategy.as_deref()),
            sources_used,
        }
    }
}

/// Providers sometimes wrap JSON in prose or code fences; find the first
/// balanced `{...}` block.
fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::ErrorKind;
    use provider::{ChunkStream, ClientError, InvokeResponse};

    struct StubClient {
        reply: String,
    }

    #[async_trait]
    impl ProviderClient for StubClient {
        fn provider_id(&self) -> &'static str {
            "stub"
        }
        fn rotate_key(&self) {}
        async fn invoke(
            &self,
            _messages: &[Message],
            _system_message: Option<&str>,
            _params: &InvokeParams,
        ) -> Result<InvokeResponse, ClientError> {
            Ok(InvokeResponse {
                text: self.reply.clone(),
                model: "stub".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 1,
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

    struct FailingClient;

    #[async_trait]
    impl ProviderClient for FailingClient {
        fn provider_id(&self) -> &'static str {
            "failing"
        }
        fn rotate_key(&self) {}
        async fn invoke(
            &self,
            _messages: &[Message],
            _system_message: Option<&str>,
            _params: &InvokeParams,
        ) -> Result<InvokeResponse, ClientError> {
            Err(ClientError::new(ErrorKind::Timeout, "boom"))
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

    fn sources() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("web_context".to_string(), "web search results".to_string());
        m.insert("strategy".to_string(), "prompt strategy".to_string());
        m
    }

    #[tokio::test]
    async fn parses_valid_json_and_clamps_scores() {
        let reply = r#"{"scores": {"web_context": 1.5, "strategy": -0.3}, "reasoning": {"web_context": "useful"}, "overall_strategy": "enriched"}"#;
        let planner = RelevancePlanner::new(Arc::new(StubClient { reply: reply.to_string() }), Duration::from_secs(1));
        let report = planner.plan("what is rust", &sources()).await;
        assert_eq!(report.scores["web_context"], 1.0);
        assert_eq!(report.scores["strategy"], 0.0);
        assert_eq!(report.overall_strategy, OverallStrategy::Enriched);
        assert!(report.sources_used.contains("web_context"));
        assert!(!report.sources_used.contains("strategy"));
    }

    #[tokio::test]
    async fn drops_unknown_sources() {
        let reply = r#"{"scores": {"not_a_real_source": 0.9}, "reasoning": {}, "overall_strategy": "standard"}"#;
        let planner = RelevancePlanner::new(Arc::new(StubClient { reply: reply.to_string() }), Duration::from_secs(1));
        let report = planner.plan("hello", &sources()).await;
        assert!(!report.scores.contains_key("not_a_real_source"));
        assert_eq!(report.scores.len(), sources().len());
    }

    #[tokio::test]
    async fn degrades_on_provider_error() {
        let planner = RelevancePlanner::new(Arc::new(FailingClient), Duration::from_secs(1));
        let report = planner.plan("hello", &sources()).await;
        assert_eq!(report.overall_strategy, OverallStrategy::Standard);
        assert!(report.scores.values().all(|&s| s == 0.5));
    }

    #[tokio::test]
    async fn degrades_on_unparseable_output() {
        let planner = RelevancePlanner::new(Arc::new(StubClient { reply: "not json at all".to_string() }), Duration::from_secs(1));
        let report = planner.plan("hello", &sources()).await;
        assert_eq!(report.overall_strategy, OverallStrategy::Standard);
    }
}
