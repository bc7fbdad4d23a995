//! Shared application state injected into every axum handler via the
//! `State<AppState>` extractor, mirroring the teacher's
//! `#[derive(Clone)] struct AppState` in `rust/gateway/src/main.rs`.

use std::sync::Arc;

use common::GatewayConfig;
use context::ContextStore;
use fallback::FallbackEngine;
use router::{FanOutDispatcher, RouterCore};

use crate::ratelimit::RateLimiter;

/// `StrategyStore` is owned by `RouterCore` (it's only ever consulted
/// during prompt assembly) and isn't re-exposed here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub fallback: Arc<FallbackEngine>,
    pub context_store: Arc<ContextStore>,
    pub router_core: Arc<RouterCore>,
    pub fanout: Arc<FanOutDispatcher>,
    pub rate_limiter: Arc<RateLimiter>,
}
