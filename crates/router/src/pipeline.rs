//! `RouterCore`: the streaming enhancement pipeline, phases 0-8 exactly as
//! specified. SSE emission is a plain `Stream<Item = SseEvent>` built with
//! `async_stream::stream!` (the pack's `synapse-gateway` router shows the
//! same generator-over-axum-SSE idiom, adapted here to stay axum-free so
//! this crate doesn't depend on the web framework). Scatter-gather in
//! Phase 3 mirrors the teacher's `pool::parallel_generate_multi` per-task
//! `Result` isolation, generalized from N-keys-one-provider to
//! N-context-sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures_util::Stream;

use common::types::{
    EnhancementMetadata, EnhancementRequest, EnhancementSettings, OutputFormat,
    ProviderId, RelevanceReport, SseEvent, SOURCE_CHAT_HISTORY, SOURCE_DOCUMENT_CONTEXT, SOURCE_STRATEGY,
    SOURCE_WEB_CONTEXT,
};
use context::ContextStore;
use fallback::{FallbackEngine, ScoringEngine};
use provider::{InvokeParams, Message};
use strategy::StrategyStore;

use crate::accounting::{NoopAccountant, TokenAccountant};
use crate::relevance::{RelevancePlanner, RELEVANCE_THRESHOLD};
use crate::websearch::{format_results, WebSearchClient};

/// Safety cap on the number of chunks a single stream may emit.
const MAX_CHUNK_COUNT: usize = 4096;
const DEFAULT_TOP_K: usize = 5;
/// Hard character limit applied to providers known to be length-sensitive
/// (Groq's corpus strategy entry documents this).
const CHAR_LIMIT_PROVIDERS: &[(ProviderId, usize)] = &[(ProviderId::Groq, 194)];

pub struct RouterCore {
    pub(crate) fallback: Arc<FallbackEngine>,
    context_store: Arc<ContextStore>,
    strategy_store: Arc<StrategyStore>,
    web_search: Arc<dyn WebSearchClient>,
    pub(crate) relevance_planner: Arc<RelevancePlanner>,
    accountant: Arc<dyn TokenAccountant>,
}

impl RouterCore {
    pub fn new(
        fallback: Arc<FallbackEngine>,
        context_store: Arc<ContextStore>,
        strategy_store: Arc<StrategyStore>,
        web_search: Arc<dyn WebSearchClient>,
        relevance_planner: Arc<RelevancePlanner>,
    ) -> Self {
        RouterCore {
            fallback,
            context_store,
            strategy_store,
            web_search,
            relevance_planner,
            accountant: Arc::new(NoopAccountant),
        }
    }

    pub fn with_accountant(mut self, accountant: Arc<dyn TokenAccountant>) -> Self {
        self.accountant = accountant;
        self
    }

    /// Picks the streaming provider: the request's explicit hint if valid,
    /// else the query-aware `ScoringEngine` winner among configured
    /// providers.
    pub(crate) fn preferred_provider(&self, request: &EnhancementRequest) -> Option<ProviderId> {
        if let Some(hint) = request.llm.as_deref().and_then(ProviderId::parse) {
            return Some(hint);
        }
        let candidates = self.fallback.configured_providers();
        if candidates.is_empty() {
            return None;
        }
        let last_used = self.fallback.last_successful();
        let reports: Vec<_> = candidates
            .iter()
            .map(|&p| ScoringEngine::score_query_aware(&self.fallback, p, &request.prompt, Some(p) == last_used))
            .collect();
        ScoringEngine::best_two(reports).into_iter().next().map(|r| r.provider)
    }

    /// Runs the full pipeline for `request`, yielding one SSE event at a
    /// time. Exactly one terminal (`complete`|`error`) event is produced,
    /// always last (Testable Property 1).
    pub fn enhance_stream(self: Arc<Self>, request_id: String, request: EnhancementRequest) -> impl Stream<Item = SseEvent> {
        stream! {
            let start = Instant::now();
            // Phase 0 — parse & validate.
            let request = request.normalize();
            if request.prompt.is_empty() {
                yield error_event(&request_id, "prompt must not be empty");
                return;
            }

            // Phase 1 — relevance planning.
            let sources = available_sources(&request);
            let report = self.relevance_planner.plan(&request.prompt, &sources).await;
            yield SseEvent::Status {
                status: "relevance_planned".to_string(),
                message: format!("strategy: {:?}", report.overall_strategy),
            };

            // Phase 2 — token accounting precheck.
            if let Some(user_id) = request.user_id.as_deref() {
                if user_id != common::types::FREE_TRIAL_USER {
                    let precheck = self.accountant.precheck(user_id, 1);
                    match tokio::time::timeout(Duration::from_secs(3), precheck).await {
                        Ok(Ok(())) => {}
                        Ok(Err(reason)) => {
                            yield error_event(&request_id, &reason);
                            return;
                        }
                        Err(_) => {
                            yield error_event(&request_id, "token accounting precheck timed out");
                            return;
                        }
                    }
                }
            }

            // Phase 3 — parallel context gathering.
            yield SseEvent::Status { status: "gathering_context".to_string(), message: "fetching context sources".to_string() };
            let gathered = self.gather_context(&request, &report).await;

            // Phase 4 — prompt assembly.
            let char_limit = self.preferred_provider(&request).and_then(provider_char_limit);
            let (system_message, enhancement_method, strategy_source) =
                assemble_system_message(&gathered, &request.settings, char_limit);
            let user_message = assemble_user_message(&request, &gathered);

            // Phase 5 — streaming generation.
            yield SseEvent::Status { status: "generating".to_string(), message: "streaming response".to_string() };
            let preferred = self.preferred_provider(&request);
            let messages = vec![Message { role: "user".to_string(), content: user_message }];
            let params = InvokeParams::default();

            let (provider_used, mut chunk_stream) = match self
                .fallback
                .stream_response_preferring(preferred, &messages, Some(system_message.as_str()), &params)
                .await
            {
                Ok(pair) => pair,
                Err(e) => {
                    yield error_event(&request_id, &format!("all providers failed: {:?}", e.0));
                    return;
                }
            };

            let mut buffer = String::new();
            let mut chunk_count = 0usize;
            use futures_util::StreamExt;
            while let Some(next) = chunk_stream.next().await {
                match next {
                    Ok(chunk) => {
                        if chunk.delta.is_empty() {
                            continue;
                        }
                        chunk_count += 1;
                        if chunk_count > MAX_CHUNK_COUNT {
                            tracing::warn!(request_id = %request_id, "chunk safety cap reached, truncating stream");
                            break;
                        }
                        let sanitized = strip_brand_names(&chunk.delta);
                        buffer.push_str(&sanitized);
                        yield SseEvent::content(sanitized);
                        if chunk.is_final {
                            break;
                        }
                    }
                    Err(e) => {
                        yield error_event(&request_id, &format!("stream error from {}: {}", provider_used, e));
                        return;
                    }
                }
            }

            // Phase 6 — post-stream validation (streaming path: log only, no retry).
            let violations = validate_settings(&buffer, &request.settings);
            if !violations.is_empty() {
                tracing::warn!(request_id = %request_id, ?violations, "enhanced prompt violates settings constraints");
            }

            // Phase 7 — finalization.
            let char_count = buffer.chars().count();
            let char_limit_compliant = char_limit.map(|limit| char_count <= limit);
            let mut settings_applied = Vec::new();
            if request.settings.word_count.is_some() {
                settings_applied.push("word_count".to_string());
            }
            if request.settings.language.is_some() {
                settings_applied.push("language".to_string());
            }
            if request.settings.complexity_level.is_some() {
                settings_applied.push("complexity_level".to_string());
            }
            if request.settings.output_format.is_some() {
                settings_applied.push("output_format".to_string());
            }
            if request.settings.custom_instructions.is_some() {
                settings_applied.push("custom_instructions".to_string());
            }
            if request.settings.template.is_some() {
                settings_applied.push("template".to_string());
            }

            let metadata = EnhancementMetadata {
                processing_time_ms: start.elapsed().as_millis() as u64,
                enhancement_method,
                strategy_source,
                settings_applied,
                tokens_deducted: None,
            };

            yield SseEvent::Complete {
                kind: "complete",
                enhanced_prompt: buffer,
                suggested_llm: provider_used,
                domain: request.domain.clone(),
                relevance_analysis: Box::new(report),
                metadata,
                document_context_used: Some(gathered.document_context.is_some()),
                char_limit_compliant,
                char_count: char_limit.map(|_| char_count),
            };

            // Schedule token deduction as a detached side effect; its
            // failure must never affect the client, and it only runs
            // because Phase 7 completed.
            if let Some(user_id) = request.user_id.clone() {
                if user_id != common::types::FREE_TRIAL_USER {
                    let accountant = Arc::clone(&self.accountant);
                    tokio::spawn(async move {
                        accountant.deduct(&user_id, 1);
                    });
                }
            }
        }
    }

    pub(crate) async fn gather_context(&self, request: &EnhancementRequest, report: &RelevanceReport) -> GatheredContext {
        let want = |name: &str| report.scores.get(name).copied().unwrap_or(0.0) > RELEVANCE_THRESHOLD;

        let web_fut = async {
            if want(SOURCE_WEB_CONTEXT) {
                let results = self.web_search.search(&request.prompt, DEFAULT_TOP_K).await;
                let text = format_results(&results);
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            } else {
                None
            }
        };

        let strategy_fut = async {
            if want(SOURCE_STRATEGY) {
                let provider = request.llm.clone().unwrap_or_else(|| "default".to_string());
                let domain = request.domain.clone();
                self.strategy_store.lookup_async(provider, domain, request.prompt.clone()).await
            } else {
                None
            }
        };

        // chat_history has no backing store in this workspace (no teacher
        // or pack counterpart); always absent regardless of relevance score.
        let chat_history_fut = async { None::<String> };

        let document_fut = async {
            match &request.context_id {
                Some(id) => match self.context_store.find_similar_chunks(id, &request.prompt, DEFAULT_TOP_K) {
                    Ok(chunks) if !chunks.is_empty() => {
                        Some(chunks.into_iter().map(|c| c.text).collect::<Vec<_>>().join("\n\n"))
                    }
                    _ => None,
                },
                None => None,
            }
        };

        let (web_context, strategy_text, chat_history, document_context) =
            tokio::join!(web_fut, strategy_fut, chat_history_fut, document_fut);

        GatheredContext { web_context, strategy_text, chat_history, document_context }
    }
}

pub(crate) struct GatheredContext {
    web_context: Option<String>,
    strategy_text: Option<String>,
    #[allow(dead_code)]
    chat_history: Option<String>,
    document_context: Option<String>,
}

pub(crate) fn available_sources(request: &EnhancementRequest) -> HashMap<String, String> {
    let mut sources = HashMap::new();
    sources.insert(SOURCE_WEB_CONTEXT.to_string(), "live web search snippets".to_string());
    sources.insert(SOURCE_STRATEGY.to_string(), "pre-indexed prompt-engineering strategy".to_string());
    sources.insert(SOURCE_CHAT_HISTORY.to_string(), "prior conversation turns".to_string());
    if request.context_id.is_some() {
        sources.insert(SOURCE_DOCUMENT_CONTEXT.to_string(), "chunks retrieved from the uploaded document".to_string());
    }
    sources
}

pub(crate) fn provider_char_limit(provider: ProviderId) -> Option<usize> {
    CHAR_LIMIT_PROVIDERS.iter().find(|(p, _)| *p == provider).map(|(_, limit)| *limit)
}

/// Phase 4's decision tree: strategy-guided > context-enriched > standard.
pub(crate) fn assemble_system_message(
    gathered: &GatheredContext,
    settings: &EnhancementSettings,
    char_limit: Option<usize>,
) -> (String, String, Option<String>) {
    let (mut message, method, strategy_source) = if let Some(strategy) = &gathered.strategy_text {
        (
            format!(
                "You are a prompt-enhancement assistant. Apply the following strategy when rewriting the user's prompt:\n{strategy}"
            ),
            "strategy-guided".to_string(),
            Some(strategy.clone()),
        )
    } else if gathered.web_context.is_some() || gathered.document_context.is_some() {
        (
            "You are a prompt-enhancement assistant. Use the provided context to rewrite the user's prompt into a clearer, more complete request.".to_string(),
            "context-enriched".to_string(),
            None,
        )
    } else {
        (
            "You are a prompt-enhancement assistant. Rewrite the user's prompt to be clearer and more complete.".to_string(),
            "standard".to_string(),
            None,
        )
    };

    append_settings_imperatives(&mut message, settings, char_limit);
    (message, method, strategy_source)
}

fn append_settings_imperatives(message: &mut String, settings: &EnhancementSettings, char_limit: Option<usize>) {
    if let Some(word_count) = settings.word_count {
        message.push_str(&format!("\nCRITICAL: the final prompt must be approximately {word_count} words."));
    }
    if let Some(language) = &settings.language {
        message.push_str(&format!("\nCRITICAL: respond in {language}."));
    }
    if let Some(level) = &settings.complexity_level {
        message.push_str(&format!("\nCRITICAL: target complexity level: {level}."));
    }
    if let Some(format) = settings.output_format {
        match format {
            OutputFormat::Tabular => message.push_str("\nCRITICAL: present the output as a table using `|` and `-` delimiters."),
            OutputFormat::Plain => {}
        }
    }
    if let Some(instructions) = &settings.custom_instructions {
        message.push_str(&format!("\nCRITICAL: {instructions}"));
    }
    if let Some(template) = &settings.template {
        message.push_str(&format!("\nCRITICAL: follow this template:\n{template}"));
    }
    if let Some(limit) = char_limit {
        message.push_str(&format!("\nCRITICAL: keep the response under {limit} characters."));
    }
}

pub(crate) fn assemble_user_message(request: &EnhancementRequest, gathered: &GatheredContext) -> String {
    let mut message = request.prompt.clone();
    if let Some(web) = &gathered.web_context {
        message.push_str("\n\n--- Web context ---\n");
        message.push_str(web);
    }
    if let Some(doc) = &gathered.document_context {
        message.push_str("\n\n--- Document context ---\n");
        message.push_str(doc);
    }
    if let Some(style) = &request.writing_style {
        message.push_str(&format!("\n\nWriting style: {style}"));
    }
    message
}

/// Strips references to backend brand names from streamed text so the
/// client can't infer which provider served the request.
fn strip_brand_names(text: &str) -> String {
    const BRANDS: &[(&str, &str)] = &[
        ("claude", "the assistant"),
        ("anthropic", "the provider"),
        ("gpt-4", "the model"),
        ("gpt-3", "the model"),
        ("chatgpt", "the assistant"),
        ("openai", "the provider"),
        ("gemini", "the model"),
        ("google", "the provider"),
        ("groq", "the provider"),
    ];
    let mut result = text.to_string();
    for (brand, replacement) in BRANDS {
        result = replace_ignore_case(&result, brand, replacement);
    }
    result
}

fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();
    if !lower_haystack.contains(&lower_needle) {
        return haystack.to_string();
    }
    let mut result = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut rest_lower = lower_haystack.as_str();
    while let Some(idx) = rest_lower.find(&lower_needle) {
        result.push_str(&rest[..idx]);
        result.push_str(replacement);
        rest = &rest[idx + needle.len()..];
        rest_lower = &rest_lower[idx + needle.len()..];
    }
    result.push_str(rest);
    result
}

/// Phase 6 validation, shared with the non-streaming retry loop in
/// `simple.rs`.
pub fn validate_settings(text: &str, settings: &EnhancementSettings) -> Vec<String> {
    let mut violations = Vec::new();
    if let Some(target) = settings.word_count {
        let actual = text.split_whitespace().count() as u32;
        let tolerance = ((target as f64) * 0.1).ceil() as u32;
        if (actual as i64 - target as i64).unsigned_abs() as u32 > tolerance {
            violations.push(format!("word_count: expected ~{target} (+/-{tolerance}), got {actual}"));
        }
    }
    if let Some(language) = &settings.language {
        if let Some(range) = script_range_for_language(language) {
            if !text.chars().any(|c| range.contains(&(c as u32))) {
                violations.push(format!("language: expected {language} script range, none found"));
            }
        }
    }
    if settings.output_format == Some(OutputFormat::Tabular) && !(text.contains('|') || text.contains('-')) {
        violations.push("output_format: expected tabular delimiters".to_string());
    }
    violations
}

/// Unicode codepoint range a script-bound language's output must contain at
/// least one character from. Only languages with a distinct, non-Latin
/// script are checked; others pass through unchecked.
fn script_range_for_language(language: &str) -> Option<std::ops::RangeInclusive<u32>> {
    match language.to_ascii_lowercase().as_str() {
        "hindi" => Some(0x0900..=0x097F),
        _ => None,
    }
}

pub(crate) fn error_event(request_id: &str, message: &str) -> SseEvent {
    SseEvent::Error {
        error: message.to_string(),
        request_id: request_id.to_string(),
        support_info: format!("Include request ID {request_id} when contacting support"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_brand_names_case_insensitively() {
        let out = strip_brand_names("Claude and GPT-4 and Gemini all work well");
        assert!(!out.to_lowercase().contains("claude"));
        assert!(!out.to_lowercase().contains("gpt-4"));
        assert!(!out.to_lowercase().contains("gemini"));
    }

    #[test]
    fn assemble_prefers_strategy_over_context() {
        let gathered = GatheredContext {
            web_context: Some("web stuff".to_string()),
            strategy_text: Some("use XML tags".to_string()),
            chat_history: None,
            document_context: None,
        };
        let (message, method, source) = assemble_system_message(&gathered, &EnhancementSettings::default(), None);
        assert_eq!(method, "strategy-guided");
        assert!(message.contains("use XML tags"));
        assert_eq!(source, Some("use XML tags".to_string()));
    }

    #[test]
    fn assemble_falls_back_to_context_enriched() {
        let gathered = GatheredContext {
            web_context: Some("web stuff".to_string()),
            strategy_text: None,
            chat_history: None,
            document_context: None,
        };
        let (_, method, _) = assemble_system_message(&gathered, &EnhancementSettings::default(), None);
        assert_eq!(method, "context-enriched");
    }

    #[test]
    fn assemble_falls_back_to_standard() {
        let gathered = GatheredContext { web_context: None, strategy_text: None, chat_history: None, document_context: None };
        let (_, method, _) = assemble_system_message(&gathered, &EnhancementSettings::default(), None);
        assert_eq!(method, "standard");
    }

    #[test]
    fn appends_word_count_imperative() {
        let mut msg = String::new();
        let settings = EnhancementSettings { word_count: Some(50), ..Default::default() };
        append_settings_imperatives(&mut msg, &settings, None);
        assert!(msg.contains("CRITICAL") && msg.contains("50 words"));
    }

    #[test]
    fn appends_char_limit_imperative_for_hard_limit_providers() {
        let mut msg = String::new();
        append_settings_imperatives(&mut msg, &EnhancementSettings::default(), Some(194));
        assert!(msg.contains("CRITICAL") && msg.contains("194 characters"));
    }

    #[test]
    fn omits_char_limit_imperative_when_provider_has_none() {
        let mut msg = String::new();
        append_settings_imperatives(&mut msg, &EnhancementSettings::default(), None);
        assert!(!msg.contains("characters"));
    }

    #[test]
    fn validate_settings_flags_word_count_violation() {
        let settings = EnhancementSettings { word_count: Some(100), ..Default::default() };
        let text = "only a few words here";
        let violations = validate_settings(text, &settings);
        assert!(!violations.is_empty());
    }

    #[test]
    fn validate_settings_accepts_within_tolerance() {
        let settings = EnhancementSettings { word_count: Some(4), ..Default::default() };
        let violations = validate_settings("one two three four", &settings);
        assert!(violations.is_empty());
    }

    #[test]
    fn validate_settings_flags_missing_table_delimiters() {
        let settings = EnhancementSettings { output_format: Some(OutputFormat::Tabular), ..Default::default() };
        let violations = validate_settings("just plain prose", &settings);
        assert!(!violations.is_empty());
    }

    #[test]
    fn validate_settings_flags_missing_devanagari_script_for_hindi() {
        let settings = EnhancementSettings { language: Some("Hindi".to_string()), ..Default::default() };
        let violations = validate_settings("please provide more detail", &settings);
        assert!(!violations.is_empty());
    }

    #[test]
    fn validate_settings_accepts_devanagari_text_for_hindi() {
        let settings = EnhancementSettings { language: Some("hindi".to_string()), ..Default::default() };
        let violations = validate_settings("कृपया इस विषय पर विस्तृत जानकारी प्रदान करें", &settings);
        assert!(violations.is_empty());
    }

    #[test]
    fn validate_settings_ignores_non_script_bound_languages() {
        let settings = EnhancementSettings { language: Some("french".to_string()), ..Default::default() };
        let violations = validate_settings("plain english text", &settings);
        assert!(violations.is_empty());
    }

    mod full_pipeline {
        use super::*;
        use crate::relevance::RelevancePlanner;
        use crate::websearch::ReqwestWebSearch;
        use async_trait::async_trait;
        use common::types::EnhancementRequest;
        use fallback::ProviderEntry;
        use futures_util::StreamExt;
        use provider::{ChunkStream, ClientError, InvokeResponse, ProviderClient, StreamChunk};
        use std::collections::HashMap as Map;

        struct ScriptedClient {
            chunks: Vec<&'static str>,
            plan_reply: String,
        }

        #[async_trait]
        impl ProviderClient for ScriptedClient {
            fn provider_id(&self) -> &'static str {
                "scripted"
            }
            fn rotate_key(&self) {}

            async fn invoke(
                &self,
                _messages: &[Message],
                _system_message: Option<&str>,
                _params: &InvokeParams,
            ) -> Result<InvokeResponse, ClientError> {
                Ok(InvokeResponse {
                    text: self.plan_reply.clone(),
                    model: "scripted".to_string(),
                    input_tokens: 1,
                    output_tokens: 1,
                    latency_ms: 1,
                })
            }

            async fn stream(
                &self,
                _messages: &[Message],
                _system_message: Option<&str>,
                _params: &InvokeParams,
            ) -> Result<ChunkStream, ClientError> {
                let chunks = self.chunks.clone();
                let s = async_stream::stream! {
                    let last = chunks.len().saturating_sub(1);
                    for (i, c) in chunks.into_iter().enumerate() {
                        yield Ok(StreamChunk { delta: c.to_string(), is_final: i == last });
                    }
                };
                Ok(Box::pin(s))
            }
        }

        fn build_core(reply_text: &'static str, plan_reply: &str) -> RouterCore {
            let mut entries = Map::new();
            entries.insert(
                ProviderId::Anthropic,
                ProviderEntry {
                    client: Arc::new(ScriptedClient { chunks: vec![reply_text], plan_reply: plan_reply.to_string() }),
                    retry_attempts: 0,
                    base_cooldown: Duration::from_millis(10),
                },
            );
            let fallback = Arc::new(FallbackEngine::new(entries));
            let context_store = Arc::new(ContextStore::new(None));
            let strategy_store = Arc::new(StrategyStore::new());
            let web_search = Arc::new(ReqwestWebSearch::new(None));
            let planner = Arc::new(RelevancePlanner::new(
                Arc::new(ScriptedClient { chunks: vec![], plan_reply: plan_reply.to_string() }),
                Duration::from_secs(1),
            ));
            RouterCore::new(fallback, context_store, strategy_store, web_search, planner)
        }

        #[tokio::test]
        async fn emits_exactly_one_terminal_event_as_the_last_event() {
            let plan_reply = r#"{"scores":{"web_context":0.1,"strategy":0.1,"chat_history":0.1},"reasoning":{},"overall_strategy":"standard"}"#;
            let core = Arc::new(build_core("hello world", plan_reply));
            let request = EnhancementRequest {
                prompt: "say hi".to_string(),
                context_id: None,
                llm: Some("anthropic".to_string()),
                domain: None,
                writing_style: None,
                intent: None,
                intent_description: None,
                user_id: None,
                auth_token: None,
                settings: EnhancementSettings::default(),
            };
            let events: Vec<SseEvent> = core.enhance_stream("req-test".to_string(), request).collect::<Vec<_>>().await;
            assert!(!events.is_empty());
            let terminal_count = events
                .iter()
                .filter(|e| matches!(e, SseEvent::Complete { .. } | SseEvent::Error { .. }))
                .count();
            assert_eq!(terminal_count, 1);
            assert!(matches!(events.last().unwrap(), SseEvent::Complete { .. } | SseEvent::Error { .. }));
        }

        #[tokio::test]
        async fn empty_prompt_errors_before_any_provider_call() {
            let plan_reply = r#"{"scores":{},"reasoning":{},"overall_strategy":"standard"}"#;
            let core = Arc::new(build_core("unused", plan_reply));
            let request = EnhancementRequest {
                prompt: "   ".to_string(),
                context_id: None,
                llm: None,
                domain: None,
                writing_style: None,
                intent: None,
                intent_description: None,
                user_id: None,
                auth_token: None,
                settings: EnhancementSettings::default(),
            };
            let events: Vec<SseEvent> = core.enhance_stream("req-empty".to_string(), request).collect::<Vec<_>>().await;
            assert_eq!(events.len(), 1);
            assert!(matches!(events[0], SseEvent::Error { .. }));
        }
    }
}
