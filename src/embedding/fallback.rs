//! Deterministic offline fallback embedder.
//!
//! Produces pseudo-embeddings without a network provider by hashing
//! lexical features into a fixed-width vector. The feature set is
//! tuned for tribunal text, where discriminative signal sits in
//! statutory references ("213", "2004") and fixed legal phrases
//! ("prescribed information", "wear and tear"): numeric tokens are
//! up-weighted and adjacent word pairs are hashed alongside single
//! words so phrase overlap moves the cosine. This is lexical overlap,
//! not semantics; production uses [`super::OpenAiEmbedder`]. Used by
//! the test suite and as an offline escape hatch.

use async_trait::async_trait;

use crate::Result;
use crate::embedding::Embedder;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Weight of a single-word feature.
const WORD_WEIGHT: f32 = 1.0;

/// Weight of a numeric token (section numbers, years, amounts).
const NUMERIC_WEIGHT: f32 = 1.6;

/// Weight of an adjacent word-pair feature.
const BIGRAM_WEIGHT: f32 = 0.75;

/// Deterministic lexical-feature embedder.
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    /// Creates a fallback embedder with the given dimensions.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// FNV-1a over the bytes of a feature string.
    fn fnv1a(feature: &str) -> u64 {
        let mut hash = FNV_OFFSET;
        for byte in feature.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Scatters one feature into the vector. Bucket and sign come from
    /// disjoint bit ranges of the hash so they stay decorrelated.
    fn scatter(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let hash = Self::fnv1a(feature);
        let bucket = ((hash >> 8) as usize) % self.dimensions;
        let sign = if hash.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
        embedding[bucket] += sign * weight;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();

        // Single words, with statutory-style numeric tokens boosted.
        for word in &words {
            let weight = if word.chars().all(|c| c.is_ascii_digit()) {
                NUMERIC_WEIGHT
            } else {
                WORD_WEIGHT
            };
            self.scatter(&mut embedding, word, weight);
        }

        // Adjacent word pairs capture fixed legal phrases.
        for pair in words.windows(2) {
            let feature = format!("{}\u{1f}{}", pair[0], pair[1]);
            self.scatter(&mut embedding, &feature, BIGRAM_WEIGHT);
        }

        // Unit length so cosine similarity behaves.
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "fallback-lexical"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        Ok(texts
            .par_iter()
            .map(|text| self.generate_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = FallbackEmbedder::new(128);
        let a = embedder.embed("deposit protection failure").await.unwrap();
        let b = embedder.embed("deposit protection failure").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let embedder = FallbackEmbedder::new(128);
        let v = embedder.embed("the tribunal decision").await.unwrap();
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_overlapping_text_scores_higher() {
        let embedder = FallbackEmbedder::new(256);
        let base = embedder
            .embed("landlord failed to protect the deposit")
            .await
            .unwrap();
        let close = embedder
            .embed("the deposit was not protected by the landlord")
            .await
            .unwrap();
        let far = embedder.embed("quantum chromodynamics lattice").await.unwrap();
        assert!(cosine_similarity(&base, &close) > cosine_similarity(&base, &far));
    }

    #[tokio::test]
    async fn test_shared_phrase_beats_shared_words() {
        // Both candidates share the same two words with the base text;
        // only one preserves them as the adjacent phrase "section 213".
        let embedder = FallbackEmbedder::new(256);
        let base = embedder.embed("breach of section 213").await.unwrap();
        let phrase = embedder.embed("section 213 applies").await.unwrap();
        let scattered = embedder
            .embed("213 applies to this section")
            .await
            .unwrap();
        assert!(
            cosine_similarity(&base, &phrase) > cosine_similarity(&base, &scattered)
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = FallbackEmbedder::new(64);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = FallbackEmbedder::new(64);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        for (text, emb) in texts.iter().zip(&batch) {
            assert_eq!(emb, &embedder.embed(text).await.unwrap());
        }
    }

    #[test]
    fn test_fnv1a_known_values() {
        // FNV-1a 64 reference vectors.
        assert_eq!(FallbackEmbedder::fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(FallbackEmbedder::fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }
}
