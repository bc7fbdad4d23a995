//! `ContextStore`: ingestion, cosine-similarity retrieval, and deletion of
//! uploaded context blobs, per spec §4.7. Document extraction is dispatched
//! by format in `extract` (PDF/word-processor/presentation/plain-text);
//! image ingestion takes a caller-supplied vision-model caption. Disk
//! snapshot persistence is grounded on `keyvault::vault::store`'s
//! open-or-create-on-path idiom, simplified to one JSON file per
//! `ContextID`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::chunking::{chunk_text, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::encoder::Encoder;
use crate::extract;

const MIN_TEXT_LENGTH: usize = 8;
const MIN_CAPTION_LENGTH: usize = 8;
const MIN_RELEVANCE_THRESHOLD: f32 = 0.15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub filename: String,
    pub file_type: String,
    pub content_type: String,
    pub upload_time: DateTime<Utc>,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: ContextMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
    pub chunk_index: usize,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("extracted text too short ({len} chars, minimum {min})")]
    TextTooShort { len: usize, min: usize },
    #[error("document produced zero chunks")]
    NoChunks,
    #[error("no such context: {0}")]
    NotFound(String),
    #[error("snapshot I/O error: {0}")]
    Io(String),
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("generated caption too short ({len} chars, minimum {min})")]
    CaptionTooShort { len: usize, min: usize },
    #[error("no vision-capable provider configured to caption this image")]
    NoVisionProvider,
}

pub struct ContextStore {
    entries: RwLock<HashMap<String, Arc<ContextEntry>>>,
    encoder: Encoder,
    snapshot_dir: Option<PathBuf>,
}

fn content_id(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let digest = hasher.finish();
    let secs = Utc::now().timestamp();
    format!("ctx_{:08x}_{}", (digest & 0xffff_ffff) as u32, secs)
}

impl ContextStore {
    pub fn new(snapshot_dir: Option<PathBuf>) -> Self {
        let store = ContextStore {
            entries: RwLock::new(HashMap::new()),
            encoder: Encoder::default(),
            snapshot_dir,
        };
        store.rehydrate();
        store
    }

    fn rehydrate(&self) {
        let Some(dir) = &self.snapshot_dir else { return };
        let Ok(read_dir) = std::fs::read_dir(dir) else { return };
        let mut entries = self.entries.write().unwrap();
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(&path) else { continue };
            let Ok(parsed) = serde_json::from_str::<ContextEntry>(&raw) else { continue };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            entries.insert(stem.to_string(), Arc::new(parsed));
        }
    }

    fn snapshot(&self, context_id: &str, entry: &ContextEntry) -> Result<(), ContextError> {
        let Some(dir) = &self.snapshot_dir else { return Ok(()) };
        std::fs::create_dir_all(dir).map_err(|e| ContextError::Io(e.to_string()))?;
        let path = dir.join(format!("{context_id}.json"));
        let raw = serde_json::to_string(entry).map_err(|e| ContextError::Io(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| ContextError::Io(e.to_string()))
    }

    /// Ingests already-extracted plain text: chunks, embeds, and stores it.
    /// `ingest_document` and `ingest_image` are the format-aware entry
    /// points most callers want; this is the shared tail both call into,
    /// and stays public for tests and any caller that already has text.
    pub fn ingest(
        &self,
        text: &str,
        filename: &str,
        file_type: &str,
        content_type: &str,
    ) -> Result<String, ContextError> {
        let text = text.trim();
        if text.len() < MIN_TEXT_LENGTH {
            return Err(ContextError::TextTooShort { len: text.len(), min: MIN_TEXT_LENGTH });
        }

        let chunks = chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP);
        if chunks.is_empty() {
            return Err(ContextError::NoChunks);
        }

        let embeddings: Vec<Vec<f32>> = chunks.iter().map(|c| self.encoder.encode(c)).collect();
        let context_id = content_id(text);

        let entry = ContextEntry {
            metadata: ContextMetadata {
                filename: filename.to_string(),
                file_type: file_type.to_string(),
                content_type: content_type.to_string(),
                upload_time: Utc::now(),
                chunk_count: chunks.len(),
            },
            chunks,
            embeddings,
        };

        self.snapshot(&context_id, &entry)?;
        self.entries.write().unwrap().insert(context_id.clone(), Arc::new(entry));
        Ok(context_id)
    }

    /// Extracts text per the document's dispatched format (PDF,
    /// word-processor, presentation, or plain text) and ingests it. The
    /// caller is only responsible for handing over the raw upload bytes.
    pub fn ingest_document(&self, bytes: &[u8], filename: &str, content_type: &str) -> Result<String, ContextError> {
        let text = extract::extract_text(bytes, filename, content_type)?;
        let file_type = filename.rsplit('.').next().unwrap_or("txt").to_string();
        self.ingest(&text, filename, &file_type, content_type)
    }

    /// Ingests a vision-model-generated caption as an image's stand-in text.
    /// Callers validate image integrity and produce `caption` themselves
    /// (both require collaborators — `image` decoding and a vision-capable
    /// `ProviderClient` — that this store doesn't own).
    pub fn ingest_image(&self, caption: &str, filename: &str, content_type: &str) -> Result<String, ContextError> {
        let trimmed = caption.trim();
        if trimmed.len() < MIN_CAPTION_LENGTH {
            return Err(ContextError::CaptionTooShort { len: trimmed.len(), min: MIN_CAPTION_LENGTH });
        }
        self.ingest(trimmed, filename, "image", content_type)
    }

    pub fn get(&self, context_id: &str) -> Option<Arc<ContextEntry>> {
        self.entries.read().unwrap().get(context_id).cloned()
    }

    /// Embeds `query` and ranks the entry's chunks by cosine similarity.
    /// If nothing clears the minimum relevance threshold, falls back to the
    /// first chunk so a caller-supplied context_id is never ignored.
    pub fn find_similar_chunks(&self, context_id: &str, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, ContextError> {
        let entry = self.get(context_id).ok_or_else(|| ContextError::NotFound(context_id.to_string()))?;
        let query_embedding = self.encoder.encode(query);

        let mut scored: Vec<ScoredChunk> = entry
            .chunks
            .iter()
            .zip(entry.embeddings.iter())
            .enumerate()
            .map(|(idx, (text, embedding))| ScoredChunk {
                text: text.clone(),
                score: Encoder::cosine_similarity(&query_embedding, embedding),
                chunk_index: idx,
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

        if scored.iter().all(|c| c.score < MIN_RELEVANCE_THRESHOLD) {
            return Ok(vec![ScoredChunk {
                text: entry.chunks[0].clone(),
                score: scored.first().map(|c| c.score).unwrap_or(0.0),
                chunk_index: 0,
            }]);
        }

        scored.truncate(top_k);
        Ok(scored)
    }

    /// Idempotent: returns whether anything was removed.
    pub fn delete(&self, context_id: &str) -> bool {
        let removed = self.entries.write().unwrap().remove(context_id).is_some();
        if removed {
            if let Some(dir) = &self.snapshot_dir {
                let _ = std::fs::remove_file(dir.join(format!("{context_id}.json")));
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_short_text() {
        let store = ContextStore::new(None);
        let err = store.ingest("hi", "f.txt", "text", "text/plain").unwrap_err();
        assert!(matches!(err, ContextError::TextTooShort { .. }));
    }

    #[test]
    fn ingest_then_retrieve_round_trips() {
        let store = ContextStore::new(None);
        let id = store.ingest("the quick brown fox jumps over the lazy dog", "f.txt", "text", "text/plain").unwrap();
        let entry = store.get(&id).unwrap();
        assert_eq!(entry.chunks.len(), entry.embeddings.len());
        assert!(id.starts_with("ctx_"));
    }

    #[test]
    fn ingest_document_extracts_plain_text_by_extension() {
        let store = ContextStore::new(None);
        let id = store.ingest_document(b"the quick brown fox jumps over the lazy dog", "notes.txt", "text/plain").unwrap();
        let entry = store.get(&id).unwrap();
        assert_eq!(entry.metadata.file_type, "txt");
    }

    #[test]
    fn ingest_image_rejects_too_short_caption() {
        let store = ContextStore::new(None);
        let err = store.ingest_image("a cat", "photo.png", "image/png").unwrap_err();
        assert!(matches!(err, ContextError::CaptionTooShort { .. }));
    }

    #[test]
    fn ingest_image_accepts_a_real_caption() {
        let store = ContextStore::new(None);
        let id = store.ingest_image("a tabby cat sitting on a windowsill in morning light", "photo.png", "image/png").unwrap();
        let entry = store.get(&id).unwrap();
        assert_eq!(entry.metadata.file_type, "image");
    }

    #[test]
    fn find_similar_chunks_falls_back_to_first_when_nothing_relevant() {
        let store = ContextStore::new(None);
        let id = store.ingest("alpha beta gamma delta epsilon zeta eta theta", "f.txt", "text", "text/plain").unwrap();
        let results = store.find_similar_chunks(&id, "completely unrelated query text", 3).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = ContextStore::new(None);
        let id = store.ingest("the quick brown fox jumps over the lazy dog", "f.txt", "text", "text/plain").unwrap();
        assert!(store.delete(&id));
        assert!(!store.delete(&id));
    }

    #[test]
    fn snapshot_rehydrates_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = ContextStore::new(Some(dir.path().to_path_buf()));
            store.ingest("persisted context entry should survive a restart cycle", "f.txt", "text", "text/plain").unwrap()
        };
        let reloaded = ContextStore::new(Some(dir.path().to_path_buf()));
        assert!(reloaded.get(&id).is_some());
    }
}
