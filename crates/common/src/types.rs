//! Core data types shared across the gateway: provider identity, the
//! enhancement request/response shapes, and SSE event payloads.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Process-wide set of backend providers the gateway knows how to dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Anthropic,
    OpenAi,
    Google,
    Groq,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Anthropic,
        ProviderId::OpenAi,
        ProviderId::Google,
        ProviderId::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAi => "openai",
            ProviderId::Google => "google",
            ProviderId::Groq => "groq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Some(ProviderId::Anthropic),
            "openai" => Some(ProviderId::OpenAi),
            "google" => Some(ProviderId::Google),
            "groq" => Some(ProviderId::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format constraint for an enhanced prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Tabular,
}

/// Per-request settings that become hard constraints on the enhanced prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancementSettings {
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub complexity_level: Option<String>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

/// Sentinel `user_id` exempt from token accounting.
pub const FREE_TRIAL_USER: &str = "free-trial";

#[derive(Debug, Clone, Deserialize)]
pub struct EnhancementRequest {
    pub prompt: String,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub llm: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub writing_style: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub intent_description: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub settings: EnhancementSettings,
}

impl EnhancementRequest {
    /// Normalizes a partially-malformed request the way Phase 0 requires:
    /// missing settings default to empty, word_count is validated as an
    /// integer by serde already (a non-integer value fails to deserialize
    /// upstream), so this only trims the prompt and drops empty strings.
    pub fn normalize(mut self) -> Self {
        self.prompt = self.prompt.trim().to_string();
        if self.domain.as_deref() == Some("") {
            self.domain = None;
        }
        self
    }
}

/// The source catalog RelevancePlanner scores against.
pub const SOURCE_WEB_CONTEXT: &str = "web_context";
pub const SOURCE_STRATEGY: &str = "strategy";
pub const SOURCE_CHAT_HISTORY: &str = "chat_history";
pub const SOURCE_DOCUMENT_CONTEXT: &str = "document_context";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStrategy {
    Minimal,
    Standard,
    Enriched,
    Comprehensive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceReport {
    pub scores: HashMap<String, f64>,
    pub reasoning: HashMap<String, String>,
    pub overall_strategy: OverallStrategy,
    pub sources_used: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementMetadata {
    pub processing_time_ms: u64,
    pub enhancement_method: String,
    pub strategy_source: Option<String>,
    pub settings_applied: Vec<String>,
    pub tokens_deducted: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedPromptResult {
    pub enhanced_prompt: String,
    pub suggested_llm: ProviderId,
    pub domain: Option<String>,
    pub relevance_analysis: RelevanceReport,
    pub metadata: EnhancementMetadata,
}

/// A single server-sent event in the enhancement stream.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SseEvent {
    Status {
        status: String,
        message: String,
    },
    Content {
        #[serde(rename = "type")]
        kind: &'static str,
        chunk: String,
    },
    Complete {
        #[serde(rename = "type")]
        kind: &'static str,
        enhanced_prompt: String,
        suggested_llm: ProviderId,
        domain: Option<String>,
        relevance_analysis: Box<RelevanceReport>,
        metadata: EnhancementMetadata,
        #[serde(skip_serializing_if = "Option::is_none")]
        document_context_used: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        char_limit_compliant: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        char_count: Option<usize>,
    },
    Error {
        error: String,
        request_id: String,
        support_info: String,
    },
}

impl SseEvent {
    pub fn content(chunk: String) -> Self {
        SseEvent::Content { kind: "content", chunk }
    }
}

/// Per-provider score report produced by the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Available,
    Cooldown,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub provider: ProviderId,
    pub final_score: f64,
    pub query_suitability: f64,
    pub availability_score: f64,
    pub error_score: f64,
    pub recency_boost: f64,
    pub stability_score: f64,
    pub randomization: f64,
    pub status: ProviderStatus,
}
