//! Deterministic hash-based embedding, standing in for the real embedding
//! service (an explicit external collaborator). Grounded on
//! `omni-memory::encoder::IntentEncoder`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Clone)]
pub struct Encoder {
    dimension: usize,
}

impl Encoder {
    pub fn new(dimension: usize) -> Self {
        Encoder { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Encodes text into a unit-length embedding vector. Similar text hashes
    /// to similar vectors only by coincidence — this is a stand-in, not a
    /// semantic embedding.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for (i, value) in embedding.iter_mut().enumerate() {
            let i_u64 = i as u64;

            let mut hasher1 = DefaultHasher::new();
            text.hash(&mut hasher1);
            i_u64.hash(&mut hasher1);
            let hash1 = hasher1.finish();

            let mut hasher2 = DefaultHasher::new();
            text.hash(&mut hasher2);
            i_u64.wrapping_mul(31).hash(&mut hasher2);
            let hash2 = hasher2.finish();

            let combined = hash1.wrapping_mul(31).wrapping_add(hash2);
            let bucket = (combined % 1000) as f32;
            *value = bucket / 1000.0;
        }
        Self::normalize(&embedding)
    }

    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return v.to_vec();
        }
        v.iter().map(|x| x / norm).collect()
    }

    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new(384)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        let enc = Encoder::default();
        assert_eq!(enc.encode("hello world"), enc.encode("hello world"));
    }

    #[test]
    fn different_text_yields_different_vectors() {
        let enc = Encoder::default();
        assert_ne!(enc.encode("hello"), enc.encode("goodbye"));
    }

    #[test]
    fn vectors_are_unit_length() {
        let enc = Encoder::default();
        let v = enc.encode("some text");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn self_similarity_is_one() {
        let enc = Encoder::default();
        let v = enc.encode("identical text");
        let sim = Encoder::cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn mismatched_dimensions_yield_zero() {
        assert_eq!(Encoder::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
