//! HTTP handlers for every route in `main.rs`'s router, per spec §6's
//! endpoint table. Grounded on `keyvault::server::handle_request`'s shape
//! (every method returns a typed `Result`, translated to a response at the
//! edge) and the original Python gateway's route bodies
//! (`examples/original_source/Velocity/PromptEnhancement`), ported to
//! axum extractors.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use common::types::{EnhancementRequest, ProviderId};
use fallback::{classify_task, ScoringEngine};
use provider::{InvokeParams, Message};
use router::enhance_once;

use crate::error::GatewayError;
use crate::request_id::RequestId;
use crate::state::AppState;

// ── /health ──────────────────────────────────────────────────────────

pub async fn health(axum::extract::Extension(id): axum::extract::Extension<RequestId>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "request_id": id.0 }))
}

// ── /enhance/stream ──────────────────────────────────────────────────

pub async fn enhance_stream(
    State(state): State<AppState>,
    axum::extract::Extension(id): axum::extract::Extension<RequestId>,
    Json(request): Json<EnhancementRequest>,
) -> Response {
    let stream = Arc::clone(&state.router_core).enhance_stream(id.0, request);
    let events = stream.map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, std::convert::Infallible>(Event::default().data(payload))
    });
    let sse = Sse::new(events).keep_alive(axum::response::sse::KeepAlive::default());
    let mut response = sse.into_response();
    response.headers_mut().insert("Cache-Control", "no-cache".parse().unwrap());
    response.headers_mut().insert("Connection", "keep-alive".parse().unwrap());
    response
}

// ── /refine ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    prompt: String,
    #[serde(default)]
    qa_pairs: Vec<QaPair>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QaPair {
    question: String,
    answer: String,
}

pub async fn refine(State(state): State<AppState>, Json(body): Json<RefineRequest>) -> Result<Response, GatewayError> {
    let mut prompt = body.prompt;
    if !body.qa_pairs.is_empty() {
        prompt.push_str("\n\nAdditional clarifications:\n");
        for pair in &body.qa_pairs {
            prompt.push_str(&format!("Q: {}\nA: {}\n", pair.question, pair.answer));
        }
    }
    if let Some(context) = body.context {
        prompt.push_str(&format!("\n\nContext:\n{context}"));
    }

    let request = EnhancementRequest {
        prompt,
        context_id: None,
        llm: None,
        domain: None,
        writing_style: None,
        intent: None,
        intent_description: None,
        user_id: None,
        auth_token: None,
        settings: Default::default(),
    };

    let result = enhance_once(&state.router_core, request).await.map_err(GatewayError::ProviderUnavailable)?;
    Ok(Json(result).into_response())
}

// ── /clarify ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ClarifyResponse {
    questions: Vec<String>,
}

const CLARIFY_SYSTEM_PROMPT: &str = "You help users clarify an ambiguous prompt before it is sent to a \
language model. Given the user's prompt, respond with 2-4 short clarifying questions, one per line, no \
numbering or prose.";

pub async fn clarify(State(state): State<AppState>, Json(body): Json<ClarifyRequest>) -> Result<Json<ClarifyResponse>, GatewayError> {
    let (_, text) = state
        .fallback
        .get_response(&body.prompt, Some(CLARIFY_SYSTEM_PROMPT))
        .await
        .map_err(|e| GatewayError::ProviderUnavailable(format!("{:?}", e.0)))?;
    let questions = text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
    Ok(Json(ClarifyResponse { questions }))
}

// ── /recommendation ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    recommendation: String,
}

const RECOMMENDATION_SYSTEM_PROMPT: &str =
    "You suggest one concrete improvement to a user's prompt in approximately 17 words. Respond with the \
recommendation only, no preamble.";

pub async fn recommendation(
    State(state): State<AppState>,
    Json(body): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, GatewayError> {
    let (_, text) = state
        .fallback
        .get_response(&body.prompt, Some(RECOMMENDATION_SYSTEM_PROMPT))
        .await
        .map_err(|e| GatewayError::ProviderUnavailable(format!("{:?}", e.0)))?;
    Ok(Json(RecommendationResponse { recommendation: text.trim().to_string() }))
}

// ── /analyze-quality ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeQualityRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeQualityResponse {
    quality: String,
    score: f64,
    reasons: Vec<String>,
}

const QUALITY_SYSTEM_PROMPT: &str = "You rate how well-formed a prompt is for a language model. Respond \
with a single JSON object only: {\"quality\": \"good\"|\"ok\"|\"bad\", \"score\": float in [0,1], \
\"reasons\": [string]}.";

pub async fn analyze_quality(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeQualityRequest>,
) -> Json<AnalyzeQualityResponse> {
    match state.fallback.get_response(&body.prompt, Some(QUALITY_SYSTEM_PROMPT)).await {
        Ok((_, text)) => match extract_and_parse(&text) {
            Some(parsed) => Json(parsed),
            None => Json(degraded_quality()),
        },
        Err(_) => Json(degraded_quality()),
    }
}

#[derive(Deserialize)]
struct RawQuality {
    #[serde(default = "default_quality")]
    quality: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reasons: Vec<String>,
}

fn default_quality() -> String {
    "ok".to_string()
}

fn degraded_quality() -> AnalyzeQualityResponse {
    AnalyzeQualityResponse {
        quality: "ok".to_string(),
        score: 0.5,
        reasons: vec!["quality analysis unavailable, degraded default returned".to_string()],
    }
}

fn extract_and_parse(text: &str) -> Option<AnalyzeQualityResponse> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let raw: RawQuality = serde_json::from_str(&text[start..=end]).ok()?;
    Some(AnalyzeQualityResponse { quality: raw.quality, score: raw.score.clamp(0.0, 1.0), reasons: raw.reasons })
}

// ── /identify-intent ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IdentifyIntentRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifyIntentResponse {
    intent: String,
    confidence: f64,
}

/// Reuses `ScoringEngine`'s keyword-based task classifier as the intent
/// taxonomy, rather than round-tripping to an LLM for a one-shot
/// classification the spec frames as a thin external-collaborator wrapper.
pub async fn identify_intent(Json(body): Json<IdentifyIntentRequest>) -> Json<IdentifyIntentResponse> {
    let task = classify_task(&body.prompt);
    let confidence = if task == fallback::TaskType::General { 0.4 } else { 0.8 };
    Json(IdentifyIntentResponse { intent: task.as_str().to_string(), confidence })
}

// ── /context/upload, /context/retrieve, /context/{id}/info, DELETE ──

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    context_id: String,
    metadata: context::ContextMetadata,
}

pub async fn context_upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>, GatewayError> {
    let mut filename = "upload.txt".to_string();
    let mut content_type = "text/plain".to_string();
    let mut bytes: Option<Bytes> = None;

    while let Some(field) =
        multipart.next_field().await.map_err(|e| GatewayError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().unwrap_or("upload.txt").to_string();
                content_type = field.content_type().unwrap_or("text/plain").to_string();
                bytes = Some(field.bytes().await.map_err(|e| GatewayError::InvalidInput(format!("{e}")))?);
            }
            _ => {
                let _ = field.text().await;
            }
        }
    }

    let bytes = bytes.ok_or_else(|| GatewayError::InvalidInput("missing file field".to_string()))?;

    let context_id = if content_type.starts_with("image/") {
        let mime = context::validate_image(&bytes).map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
        let vision_client = state
            .fallback
            .vision_capable_client()
            .ok_or_else(|| GatewayError::ProviderUnavailable("no vision-capable provider configured".to_string()))?;
        let caption = vision_client
            .caption_image(&bytes, mime)
            .await
            .map_err(|e| GatewayError::ProviderUnavailable(e.to_string()))?;
        state.context_store.ingest_image(&caption, &filename, &content_type).map_err(|e| GatewayError::InvalidInput(e.to_string()))?
    } else {
        state.context_store.ingest_document(&bytes, &filename, &content_type).map_err(|e| GatewayError::InvalidInput(e.to_string()))?
    };

    let metadata = state.context_store.get(&context_id).expect("just inserted").metadata.clone();
    Ok(Json(UploadResponse { context_id, metadata }))
}

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    context_id: String,
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

pub async fn context_retrieve(
    State(state): State<AppState>,
    Json(body): Json<RetrieveRequest>,
) -> Result<Json<Vec<context::ScoredChunk>>, GatewayError> {
    let top_k = body.top_k.clamp(1, 10);
    let chunks = state
        .context_store
        .find_similar_chunks(&body.context_id, &body.query, top_k)
        .map_err(|_| GatewayError::NotFound(body.context_id.clone()))?;
    Ok(Json(chunks))
}

pub async fn context_info(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<context::ContextMetadata>, GatewayError> {
    let entry = state.context_store.get(&id).ok_or_else(|| GatewayError::NotFound(id.clone()))?;
    Ok(Json(entry.metadata.clone()))
}

pub async fn context_delete(State(state): State<AppState>, Path(id): Path<String>) -> Json<serde_json::Value> {
    let deleted = state.context_store.delete(&id);
    Json(serde_json::json!({ "deleted": deleted }))
}

// ── /api/v1/models/{provider} ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModelInvokeRequest {
    prompt: String,
    #[serde(default)]
    system_message: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    stream: bool,
}

pub async fn models_invoke(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<ModelInvokeRequest>,
) -> Result<Response, GatewayError> {
    let provider_id = ProviderId::parse(&provider).ok_or_else(|| GatewayError::InvalidInput(format!("unknown provider: {provider}")))?;

    let lifecycle = state.fallback.lifecycle_of(provider_id);
    if lifecycle != fallback::ProviderLifecycle::Ready {
        let status = match lifecycle {
            fallback::ProviderLifecycle::Cooldown => "cooldown",
            fallback::ProviderLifecycle::Disabled => "disabled",
            fallback::ProviderLifecycle::Ready => unreachable!(),
        };
        let body = serde_json::json!({
            "success": false,
            "metadata": { "status": status },
            "error": format!("provider {provider_id} is in {status}"),
        });
        return Ok((axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response());
    }

    let messages = vec![Message { role: "user".to_string(), content: body.prompt }];
    let params = InvokeParams { temperature: body.temperature, max_tokens: body.max_tokens };

    if body.stream {
        let chunk_stream = state
            .fallback
            .stream_named(provider_id, &messages, body.system_message.as_deref(), &params)
            .await
            .map_err(|e| GatewayError::ProviderUnavailable(format!("{e:?}")))?;
        let events: std::pin::Pin<Box<dyn Stream<Item = Result<Event, std::convert::Infallible>> + Send>> =
            Box::pin(chunk_stream.map(|item| {
                let data = match item {
                    Ok(chunk) => serde_json::json!({ "type": "content", "chunk": chunk.delta }),
                    Err(e) => serde_json::json!({ "type": "error", "error": format!("{e:?}") }),
                };
                Ok(Event::default().data(data.to_string()))
            }));
        Ok(Sse::new(events).keep_alive(axum::response::sse::KeepAlive::default()).into_response())
    } else {
        let text = state
            .fallback
            .invoke_named(provider_id, &messages, body.system_message.as_deref(), &params)
            .await
            .map_err(|e| GatewayError::ProviderUnavailable(format!("{e:?}")))?;
        Ok(Json(serde_json::json!({ "success": true, "text": text, "provider": provider_id })).into_response())
    }
}

// ── /api/v1/models/compare ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    prompt: String,
    models: Vec<String>,
}

pub async fn models_compare(State(state): State<AppState>, Json(body): Json<CompareRequest>) -> Json<serde_json::Value> {
    let providers: Vec<ProviderId> = body.models.iter().filter_map(|m| ProviderId::parse(m)).collect();
    let messages = vec![Message { role: "user".to_string(), content: body.prompt }];
    let slots = state.fanout.dispatch(&providers, &messages, None, &InvokeParams::default()).await;

    let results: Vec<serde_json::Value> = slots
        .into_iter()
        .map(|slot| match slot.result {
            Ok(text) => serde_json::json!({ "provider": slot.provider, "success": true, "text": text }),
            Err(e) => serde_json::json!({ "provider": slot.provider, "success": false, "error": format!("{e:?}") }),
        })
        .collect();
    Json(serde_json::json!({ "results": results }))
}

// ── /api/v1/models/best-two, /best-two-for-query ────────────────────

pub async fn models_best_two(State(state): State<AppState>) -> Json<serde_json::Value> {
    let last_used = state.fallback.last_successful();
    let reports: Vec<_> = state
        .fallback
        .configured_providers()
        .into_iter()
        .map(|p| ScoringEngine::score_general(&state.fallback, p, Some(p) == last_used))
        .collect();
    let best = ScoringEngine::best_two(reports);
    Json(serde_json::json!({ "best_models_list": best }))
}

#[derive(Debug, Deserialize)]
pub struct BestTwoForQueryRequest {
    query: String,
}

pub async fn models_best_two_for_query(
    State(state): State<AppState>,
    Json(body): Json<BestTwoForQueryRequest>,
) -> Json<serde_json::Value> {
    let last_used = state.fallback.last_successful();
    let reports: Vec<_> = state
        .fallback
        .configured_providers()
        .into_iter()
        .map(|p| ScoringEngine::score_query_aware(&state.fallback, p, &body.query, Some(p) == last_used))
        .collect();
    let best = ScoringEngine::best_two(reports);
    let task = classify_task(&body.query);
    Json(serde_json::json!({
        "query_analysis": { "detected_task_type": task.as_str() },
        "best_models_list": best,
    }))
}
