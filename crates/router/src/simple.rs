//! The non-streaming enhancement helper used by `/refine`, `/recommendation`,
//! and similar endpoints. Distinct from `RouterCore` (the streaming
//! orchestrator) per the Open Question resolution: two "PromptEnhancer"
//! shapes stay distinct rather than collapsed into one.
//!
//! Runs the same Phase 0-4 assembly as `RouterCore::enhance_stream`, but
//! calls `FallbackEngine::get_response` (non-streaming) and — because no
//! chunks have reached the client yet — may retry with a strengthened
//! system message when Phase 6 validation fails, up to twice.

use std::sync::Arc;
use std::time::Instant;

use common::types::{EnhancementMetadata, EnhancementRequest, EnhancedPromptResult};
use fallback::FallbackEngine;

use crate::pipeline::{
    assemble_system_message, assemble_user_message, available_sources, provider_char_limit, validate_settings, RouterCore,
};

const MAX_REENHANCEMENT_ATTEMPTS: u32 = 2;

/// Runs the pipeline once, non-streaming, returning the fully assembled
/// result. Retries with a strengthened system message (up to
/// `MAX_REENHANCEMENT_ATTEMPTS` times) if the output violates the
/// request's settings constraints.
pub async fn enhance_once(core: &RouterCore, request: EnhancementRequest) -> Result<EnhancedPromptResult, String> {
    let start = Instant::now();
    let request = request.normalize();
    if request.prompt.is_empty() {
        return Err("prompt must not be empty".to_string());
    }

    let sources = available_sources(&request);
    let report = core.relevance_planner.plan(&request.prompt, &sources).await;
    let gathered = core.gather_context(&request, &report).await;
    let char_limit = core.preferred_provider(&request).and_then(provider_char_limit);
    let (mut system_message, enhancement_method, strategy_source) = assemble_system_message(&gathered, &request.settings, char_limit);
    let user_message = assemble_user_message(&request, &gathered);

    let mut attempt = 0;
    let (provider_used, text) = loop {
        let (provider_used, text) = get_response(&core.fallback, &user_message, &system_message).await?;
        let violations = validate_settings(&text, &request.settings);
        if violations.is_empty() || attempt >= MAX_REENHANCEMENT_ATTEMPTS {
            break (provider_used, text);
        }
        attempt += 1;
        system_message.push_str(&format!(
            "\nCRITICAL: the previous attempt violated these constraints: {}. Correct them this time.",
            violations.join("; ")
        ));
    };

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

    Ok(EnhancedPromptResult {
        enhanced_prompt: text,
        suggested_llm: provider_used,
        domain: request.domain,
        relevance_analysis: report,
        metadata: EnhancementMetadata {
            processing_time_ms: start.elapsed().as_millis() as u64,
            enhancement_method,
            strategy_source,
            settings_applied,
            tokens_deducted: None,
        },
    })
}

async fn get_response(
    fallback: &Arc<FallbackEngine>,
    prompt: &str,
    system_message: &str,
) -> Result<(common::types::ProviderId, String), String> {
    fallback
        .get_response(prompt, Some(system_message))
        .await
        .map_err(|e| format!("all providers failed: {:?}", e.0))
}
