//! Embedding generation for the semantic store.
//!
//! The [`Embedder`] capability trait keeps the concrete provider
//! swappable: production uses the OpenAI-compatible client, tests and
//! offline operation use a deterministic lexical-feature fallback. The
//! query path and the ingestion path share one tokenizer and one
//! embedder instance, so similarity is always computed in a single
//! vector space.

mod fallback;
mod openai;

pub use fallback::FallbackEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;

use crate::Result;
use crate::config::EmbeddingConfig;

/// Capability trait for embedding providers.
///
/// Implementations must be thread-safe (`Send + Sync`); ingestion fans
/// batches out with bounded concurrency.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Returns the model name recorded next to stored embeddings.
    fn model_name(&self) -> &str;

    /// Generates an embedding for one text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails after retries.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// The default implementation embeds sequentially; providers
    /// override this with batched requests.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding fails.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Creates the production embedder from configuration.
#[must_use]
pub fn create_embedder(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    Box::new(OpenAiEmbedder::new(config))
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical), or 0.0
/// for mismatched lengths or zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
