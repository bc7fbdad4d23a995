//! Gateway configuration: TOML file + environment variable overrides,
//! following the teacher's `OpenClawConfig::load` idiom.

use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_base_cooldown_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_context_chunk_size() -> usize {
    500
}

fn default_context_chunk_overlap() -> usize {
    50
}

fn default_relevance_timeout_secs() -> u64 {
    5
}

fn default_fanout_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_base_cooldown_secs")]
    pub base_cooldown_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "default_context_chunk_size")]
    pub context_chunk_size: usize,

    #[serde(default = "default_context_chunk_overlap")]
    pub context_chunk_overlap: usize,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub bearer_tokens: Vec<String>,

    /// Directory `ContextStore` snapshots `ContextEntry` JSON into; absent
    /// means process-lifetime-only storage (spec's Non-goals framing).
    #[serde(default)]
    pub context_snapshot_dir: Option<std::path::PathBuf>,

    /// Endpoint `WebSearch` queries; absent degrades to empty results.
    #[serde(default)]
    pub web_search_endpoint: Option<String>,

    /// Base URL for the token-accounting webhook; absent uses the no-op
    /// accountant (spec treats billing as an external collaborator).
    #[serde(default)]
    pub token_accounting_base_url: Option<String>,

    /// Provider used to back `RelevancePlanner`'s structured-output call;
    /// defaults to the first configured provider if unset.
    #[serde(default)]
    pub relevance_planner_provider: Option<String>,

    #[serde(default = "default_relevance_timeout_secs")]
    pub relevance_timeout_secs: u64,

    #[serde(default = "default_fanout_timeout_secs")]
    pub fanout_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            base_cooldown_secs: default_base_cooldown_secs(),
            retry_attempts: default_retry_attempts(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            context_chunk_size: default_context_chunk_size(),
            context_chunk_overlap: default_context_chunk_overlap(),
            providers: Vec::new(),
            bearer_tokens: Vec::new(),
            context_snapshot_dir: None,
            web_search_endpoint: None,
            token_accounting_base_url: None,
            relevance_planner_provider: None,
            relevance_timeout_secs: default_relevance_timeout_secs(),
            fanout_timeout_secs: default_fanout_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Loads a TOML config file, falling back to defaults if it does not
    /// exist, then layers environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            GatewayConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("GATEWAY_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(v) = std::env::var("GATEWAY_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.request_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_RATE_LIMIT_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                self.rate_limit_per_minute = n;
            }
        }
        if let Ok(tokens) = std::env::var("GATEWAY_BEARER_TOKENS") {
            self.bearer_tokens = tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(dir) = std::env::var("GATEWAY_CONTEXT_SNAPSHOT_DIR") {
            self.context_snapshot_dir = Some(std::path::PathBuf::from(dir));
        }
        if let Ok(endpoint) = std::env::var("GATEWAY_WEB_SEARCH_ENDPOINT") {
            self.web_search_endpoint = Some(endpoint);
        }
        if let Ok(url) = std::env::var("GATEWAY_TOKEN_ACCOUNTING_URL") {
            self.token_accounting_base_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let config = GatewayConfig::load("/nonexistent/path/gateway.toml").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.retry_attempts, 2);
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            r#"
            bind_addr = "127.0.0.1:9000"
            rate_limit_per_minute = 120

            [[providers]]
            id = "anthropic"
            api_key_env = "ANTHROPIC_API_KEY"
            "#,
        )
        .unwrap();
        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.rate_limit_per_minute, 120);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].id, "anthropic");
    }

    #[test]
    fn env_override_wins_over_file() {
        std::env::set_var("GATEWAY_BIND_ADDR", "10.0.0.1:1234");
        let config = GatewayConfig::load("/nonexistent/path/gateway.toml").unwrap();
        assert_eq!(config.bind_addr, "10.0.0.1:1234");
        std::env::remove_var("GATEWAY_BIND_ADDR");
    }
}
