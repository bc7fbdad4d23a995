//! `ScoringEngine`: produces a per-provider `final_score` in general or
//! query-aware mode, and the `best_two()` ranking helper, per spec §4.9.
//!
//! The epsilon tie-breaker uses the same hash-to-float technique as
//! `omni-memory::encoder`'s hash-based embedding, applied to a single
//! scalar instead of a vector.

use common::types::{ProviderId, ProviderStatus, ScoreReport};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::engine::FallbackEngine;
use crate::state::ProviderLifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Coding,
    Creative,
    Analytical,
    Factual,
    Conversational,
    Technical,
    Mathematical,
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Coding => "coding",
            TaskType::Creative => "creative",
            TaskType::Analytical => "analytical",
            TaskType::Factual => "factual",
            TaskType::Conversational => "conversational",
            TaskType::Technical => "technical",
            TaskType::Mathematical => "mathematical",
            TaskType::General => "general",
        }
    }
}

const KEYWORD_SETS: &[(TaskType, &[&str])] = &[
    (TaskType::Coding, &["code", "function", "bug", "compile", "refactor", "debug", "programming"]),
    (TaskType::Creative, &["story", "poem", "creative", "imagine", "fiction", "write a"]),
    (TaskType::Analytical, &["analyze", "compare", "evaluate", "pros and cons", "trade-off"]),
    (TaskType::Factual, &["what is", "who is", "when did", "define", "fact"]),
    (TaskType::Conversational, &["chat", "talk", "hello", "how are you"]),
    (TaskType::Technical, &["architecture", "system design", "protocol", "infrastructure"]),
    (TaskType::Mathematical, &["calculate", "equation", "solve for", "integral", "derivative"]),
];

/// Classifies a prompt into a fixed task type via curated keyword match.
/// Falls back to `General` when nothing matches.
pub fn classify_task(prompt: &str) -> TaskType {
    let lower = prompt.to_ascii_lowercase();
    for (task, keywords) in KEYWORD_SETS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *task;
        }
    }
    TaskType::General
}

/// Suitability of a provider for a task type, in `[0,1]`. A small curated
/// table; unlisted combinations default to a neutral 0.5.
fn suitability(task: TaskType, provider: ProviderId) -> f64 {
    use ProviderId::*;
    use TaskType::*;
    match (task, provider) {
        (Coding, Anthropic) => 0.95,
        (Coding, OpenAi) => 0.85,
        (Coding, Groq) => 0.6,
        (Coding, Google) => 0.7,
        (Creative, OpenAi) => 0.9,
        (Creative, Anthropic) => 0.85,
        (Analytical, Anthropic) => 0.9,
        (Analytical, Google) => 0.8,
        (Factual, Google) => 0.9,
        (Factual, OpenAi) => 0.75,
        (Conversational, OpenAi) => 0.85,
        (Conversational, Anthropic) => 0.8,
        (Technical, Anthropic) => 0.9,
        (Mathematical, Google) => 0.85,
        (Mathematical, OpenAi) => 0.8,
        (General, _) => 0.7,
        _ => 0.5,
    }
}

/// A static per-provider stability rating, used only in general mode.
fn stability(provider: ProviderId) -> f64 {
    match provider {
        ProviderId::Anthropic => 0.9,
        ProviderId::OpenAi => 0.85,
        ProviderId::Google => 0.8,
        ProviderId::Groq => 0.75,
    }
}

/// Deterministic per-provider tie-breaker in `[-0.02, 0.02]`, seeded by
/// provider name.
fn epsilon(provider: ProviderId) -> f64 {
    let mut hasher = DefaultHasher::new();
    provider.as_str().hash(&mut hasher);
    let bucket = (hasher.finish() % 4001) as f64; // 0..=4000
    (bucket / 4000.0) * 0.04 - 0.02
}

fn availability_score(engine: &FallbackEngine, provider: ProviderId) -> f64 {
    match engine.lifecycle_of(provider) {
        ProviderLifecycle::Ready => 1.0,
        ProviderLifecycle::Cooldown => 0.0,
        ProviderLifecycle::Disabled => 0.0,
    }
}

fn error_score(engine: &FallbackEngine, provider: ProviderId) -> f64 {
    (1.0 - 0.15 * engine.error_count_of(provider) as f64).max(0.0)
}

fn status_of(engine: &FallbackEngine, provider: ProviderId) -> ProviderStatus {
    match engine.lifecycle_of(provider) {
        ProviderLifecycle::Ready => ProviderStatus::Available,
        ProviderLifecycle::Cooldown => ProviderStatus::Cooldown,
        ProviderLifecycle::Disabled => ProviderStatus::Unavailable,
    }
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// General mode: no query context, ranks by availability/error
    /// history/recency/stability.
    pub fn score_general(engine: &FallbackEngine, provider: ProviderId, last_used: bool) -> ScoreReport {
        let availability = availability_score(engine, provider);
        let error = error_score(engine, provider);
        let eps = epsilon(provider);
        let final_score = 0.45 * availability
            + 0.25 * error
            + 0.15 * if last_used { 1.0 } else { 0.0 }
            + 0.15 * stability(provider)
            + eps;

        ScoreReport {
            provider,
            final_score,
            query_suitability: 0.0,
            availability_score: availability,
            error_score: error,
            recency_boost: if last_used { 1.0 } else { 0.0 },
            stability_score: stability(provider),
            randomization: eps,
            status: status_of(engine, provider),
        }
    }

    /// Query-aware mode: classifies the prompt and weighs task suitability
    /// most heavily.
    pub fn score_query_aware(
        engine: &FallbackEngine,
        provider: ProviderId,
        prompt: &str,
        last_used: bool,
    ) -> ScoreReport {
        let task = classify_task(prompt);
        let suit = suitability(task, provider);
        let availability = availability_score(engine, provider);
        let error = error_score(engine, provider);
        let recency = if last_used { 1.0 } else { 0.0 };
        let eps = epsilon(provider);

        let final_score = 0.50 * suit + 0.25 * availability + 0.15 * error + 0.10 * recency + eps;

        ScoreReport {
            provider,
            final_score,
            query_suitability: suit,
            availability_score: availability,
            error_score: error,
            recency_boost: recency,
            stability_score: 0.0,
            randomization: eps,
            status: status_of(engine, provider),
        }
    }

    /// Returns the top-two providers by `final_score`, ties broken by the
    /// deterministic epsilon already folded into each score.
    pub fn best_two(mut reports: Vec<ScoreReport>) -> Vec<ScoreReport> {
        reports.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());
        reports.truncate(2);
        reports
    }
}
