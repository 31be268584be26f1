//! Deterministic feature-hashing embedder.
//!
//! Each lowercased word and adjacent word pair is hashed with BLAKE3 into a
//! signed bucket, and the resulting vector is L2 normalised. Titles sharing
//! vocabulary land close together, which is enough for offline runs and tests
//! without a pretrained model.

use unicode_segmentation::UnicodeSegmentation;

use super::TitleEmbedder;
use crate::Result;
use crate::constants::DEFAULT_HASHING_DIMENSION;

const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model: String,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("blake3-hashing-{dimension}"),
        }
    }

    /// Embed one title.
    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text.unicode_words().map(str::to_lowercase).collect();
        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, joined.as_bytes(), BIGRAM_WEIGHT);
        }
        l2_normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = blake3::hash(feature);
        let bytes = digest.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl TitleEmbedder for HashingEmbedder {
    fn embed_titles(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(titles.iter().map(|title| self.embed_one(title)).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
