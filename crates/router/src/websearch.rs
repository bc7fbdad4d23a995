//! `WebSearchClient`: external search adapter. The spec treats web search
//! as an out-of-scope "external collaborator," but RouterCore's Phase 3
//! still needs something to call — this is a thin `reqwest` call to a
//! configurable endpoint, degrading to empty results on any error per the
//! error-propagation policy (source-fetch errors are swallowed and logged).

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub source: String,
}

#[async_trait]
pub trait WebSearchClient: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult>;
}

/// Formats results the way the spec requires: one block per result,
/// concatenated.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("--- Source: {} ---\n{}", r.source, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    content: String,
    #[serde(default = "default_source")]
    source: String,
}

fn default_source() -> String {
    "web".to_string()
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

/// Real implementation: calls a configured search endpoint expecting
/// `{"results": [{"content": "...", "source": "..."}]}`. Any transport or
/// parse error degrades to an empty vector.
pub struct ReqwestWebSearch {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl ReqwestWebSearch {
    pub fn new(endpoint: Option<String>) -> Self {
        ReqwestWebSearch {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl WebSearchClient for ReqwestWebSearch {
    async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let endpoint = match &self.endpoint {
            Some(e) => e,
            None => return Vec::new(),
        };
        let fetch = self
            .client
            .get(endpoint)
            .query(&[("q", query), ("top_k", &top_k.to_string())])
            .send();

        let response = match tokio::time::timeout(std::time::Duration::from_secs(8), fetch).await {
            Ok(Ok(r)) => r,
            _ => {
                tracing::warn!("web search request failed or timed out");
                return Vec::new();
            }
        };

        match response.json::<RawResponse>().await {
            Ok(parsed) => parsed
                .results
                .into_iter()
                .take(top_k)
                .map(|r| SearchResult { content: r.content, source: r.source })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "web search response parse failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_results_into_source_blocks() {
        let results = vec![
            SearchResult { content: "alpha".to_string(), source: "site-a".to_string() },
            SearchResult { content: "beta".to_string(), source: "site-b".to_string() },
        ];
        let formatted = format_results(&results);
        assert!(formatted.contains("--- Source: site-a ---\nalpha"));
        assert!(formatted.contains("--- Source: site-b ---\nbeta"));
    }

    #[test]
    fn formats_empty_results_as_empty_string() {
        assert_eq!(format_results(&[]), "");
    }

    #[tokio::test]
    async fn unconfigured_endpoint_returns_empty() {
        let client = ReqwestWebSearch::new(None);
        let results = client.search("rust async", 3).await;
        assert!(results.is_empty());
    }
}
