//! The gateway binary: wires configuration, the provider registry, the
//! core engines (`FallbackEngine`, `ContextStore`, `StrategyStore`,
//! `RouterCore`, `FanOutDispatcher`), and the axum route table, following
//! the teacher's `main.rs` wiring order (config → stores → services →
//! router → serve) from `keyvault/src/main.rs` and `rust/gateway/src/main.rs`.

mod auth;
mod error;
mod handlers;
mod ratelimit;
mod request_id;
mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::GatewayError;

use common::GatewayConfig;
use context::ContextStore;
use fallback::{FallbackEngine, ProviderEntry};
use provider::config::ProviderConfig as RuntimeProviderConfig;
use router::{FanOutDispatcher, HttpAccountant, ReqwestWebSearch, RelevancePlanner, RouterCore};
use strategy::StrategyStore;

use crate::ratelimit::RateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_tracing();

    info!("loading configuration");
    let config_path = std::env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "gateway.toml".to_string());
    let config = Arc::new(GatewayConfig::load(&config_path)?);

    // ── Provider registry ────────────────────────────────────────────
    let mut entries: HashMap<common::types::ProviderId, ProviderEntry> = HashMap::new();
    for provider_cfg in &config.providers {
        let Some(runtime_cfg) = runtime_config(provider_cfg, &config) else {
            continue;
        };
        let Some(provider_id) = common::types::ProviderId::parse(runtime_cfg.provider) else {
            tracing::warn!(provider = runtime_cfg.provider, "unknown provider id in config, skipping");
            continue;
        };
        let Some(client) = provider::registry::build_client(&runtime_cfg) else {
            continue;
        };
        entries.insert(
            provider_id,
            ProviderEntry {
                client,
                retry_attempts: runtime_cfg.retry_attempts,
                base_cooldown: Duration::from_millis(runtime_cfg.cooldown_ms),
            },
        );
    }
    info!(configured = entries.len(), "provider registry built");
    let fallback = Arc::new(FallbackEngine::new(entries));

    // ── Context & strategy stores ────────────────────────────────────
    let context_store = Arc::new(ContextStore::new(config.context_snapshot_dir.clone()));
    let strategy_store = Arc::new(StrategyStore::new());

    // ── Relevance planner ─────────────────────────────────────────────
    // Backed by whichever provider client is configured for it, falling
    // back to the first configured provider; with none configured every
    // planning call times out immediately and RelevancePlanner degrades,
    // per spec §4.4.
    let planner_client = planner_client(&config, &fallback);
    let relevance_planner = Arc::new(RelevancePlanner::new(
        planner_client,
        Duration::from_secs(config.relevance_timeout_secs),
    ));

    let web_search = Arc::new(ReqwestWebSearch::new(config.web_search_endpoint.clone()));

    let mut router_core = RouterCore::new(
        Arc::clone(&fallback),
        Arc::clone(&context_store),
        Arc::clone(&strategy_store),
        web_search,
        Arc::clone(&relevance_planner),
    );
    if let Some(base_url) = &config.token_accounting_base_url {
        router_core = router_core.with_accountant(Arc::new(HttpAccountant::new(base_url.clone())));
    }
    let router_core = Arc::new(router_core);

    let fanout = Arc::new(FanOutDispatcher::new(Arc::clone(&fallback), Duration::from_secs(config.fanout_timeout_secs)));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute as usize, 60));

    let app_state = AppState {
        config: Arc::clone(&config),
        fallback,
        context_store,
        router_core,
        fanout,
        rate_limiter,
    };

    let app = build_router(app_state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn runtime_config(cfg: &common::config::ProviderConfig, gateway: &GatewayConfig) -> Option<RuntimeProviderConfig> {
    let api_keys: Vec<String> = cfg
        .api_key_env
        .as_ref()
        .and_then(|var| std::env::var(var).ok())
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    Some(RuntimeProviderConfig {
        provider: provider_static_str(&cfg.id)?,
        model_name: cfg.default_model.clone().unwrap_or_else(|| "default".to_string()),
        api_keys,
        temperature: 0.7,
        max_tokens: 4096,
        timeout_ms: gateway.request_timeout_secs * 1000,
        retry_attempts: gateway.retry_attempts,
        cooldown_ms: gateway.base_cooldown_secs * 1000,
    })
}

/// `ProviderConfig::provider` is `&'static str`; map the configured id
/// onto one of the known static strings rather than leaking a `String`.
fn provider_static_str(id: &str) -> Option<&'static str> {
    match id.to_ascii_lowercase().as_str() {
        "anthropic" => Some("anthropic"),
        "openai" => Some("openai"),
        "google" => Some("google"),
        "groq" => Some("groq"),
        _ => None,
    }
}

fn planner_client(
    config: &GatewayConfig,
    fallback: &FallbackEngine,
) -> Arc<dyn provider::ProviderClient> {
    let preferred = config.relevance_planner_provider.as_deref().and_then(common::types::ProviderId::parse);
    let candidates = fallback.configured_providers();
    let chosen = preferred.filter(|p| candidates.contains(p)).or_else(|| candidates.first().copied());

    match chosen.and_then(|id| fallback.client_for(id)) {
        Some(client) => client,
        None => Arc::new(UnavailableClient),
    }
}

/// Stand-in used only when no provider is configured at all, so
/// `RelevancePlanner` and friends still produce their documented degraded
/// output instead of panicking at startup.
struct UnavailableClient;

#[async_trait::async_trait]
impl provider::ProviderClient for UnavailableClient {
    fn provider_id(&self) -> &'static str {
        "unavailable"
    }
    fn rotate_key(&self) {}
    async fn invoke(
        &self,
        _messages: &[provider::Message],
        _system_message: Option<&str>,
        _params: &provider::InvokeParams,
    ) -> Result<provider::InvokeResponse, provider::ClientError> {
        Err(provider::ClientError::new(common::ErrorKind::Internal, "no provider configured"))
    }
    async fn stream(
        &self,
        _messages: &[provider::Message],
        _system_message: Option<&str>,
        _params: &provider::InvokeParams,
    ) -> Result<provider::ChunkStream, provider::ClientError> {
        Err(provider::ClientError::new(common::ErrorKind::Internal, "no provider configured"))
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/enhance/stream", post(handlers::enhance_stream))
        .route("/refine", post(handlers::refine))
        .route("/clarify", post(handlers::clarify))
        .route("/recommendation", post(handlers::recommendation))
        .route("/analyze-quality", post(handlers::analyze_quality))
        .route("/identify-intent", post(handlers::identify_intent))
        .route("/context/upload", post(handlers::context_upload))
        .route("/context/retrieve", post(handlers::context_retrieve))
        .route("/context/:id/info", get(handlers::context_info))
        .route("/context/:id", delete(handlers::context_delete))
        .route("/api/v1/models/compare", post(handlers::models_compare))
        .route("/api/v1/models/best-two", get(handlers::models_best_two))
        .route("/api/v1/models/best-two-for-query", post(handlers::models_best_two_for_query))
        .route("/api/v1/models/:provider", post(handlers::models_invoke))
        .layer(axum::middleware::from_fn_with_state(state.clone(), ratelimit::enforce))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        .layer(axum::middleware::from_fn(request_id::attach))
        .layer(axum::middleware::from_fn(error::attach_request_id_to_errors))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turns a handler panic into the same `{error, support_info}` envelope
/// as any other `GatewayError`, instead of `CatchPanicLayer`'s plain body.
fn handle_panic(payload: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    GatewayError::Internal(message).into_response()
}
