//! OpenAI-compatible embedding provider.
//!
//! Batches are capped at 50 items per request; during ingestion the
//! engine fans batches out with bounded concurrency. Transient errors
//! (network, rate limit, 5xx) are retried with exponential backoff;
//! each request carries its own timeout.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::Result;
use crate::config::{EmbeddingConfig, MAX_EMBEDDING_BATCH};
use crate::embedding::Embedder;
use crate::error::EmbeddingError;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Embedding provider over the OpenAI-compatible embeddings API.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
    batch_size: usize,
    concurrency: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// Creates a provider from configuration. The credential comes from
    /// the standard environment variable, resolved by the client.
    #[must_use]
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.clamp(1, MAX_EMBEDDING_BATCH),
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy::with_max_retries(config.max_retries),
        }
    }

    /// Issues one embedding request with timeout and retry.
    async fn request_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let timeout_secs = self.timeout.as_secs();
        let embeddings = retry_with_backoff(self.retry, EmbeddingError::is_transient, || {
            let client = self.client.clone();
            let model = self.model.clone();
            let texts = texts.clone();
            let dimensions = self.dimensions;
            async move {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model)
                    .input(texts)
                    .dimensions(dimensions as u32)
                    .build()
                    .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

                let response = tokio::time::timeout(
                    Duration::from_secs(timeout_secs),
                    client.embeddings().create(request),
                )
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    seconds: timeout_secs,
                })?
                .map_err(classify)?;

                let mut data = response.data;
                data.sort_by_key(|d| d.index);
                Ok::<_, EmbeddingError>(
                    data.into_iter().map(|d| d.embedding).collect::<Vec<_>>(),
                )
            }
        })
        .await?;

        for embedding in &embeddings {
            if embedding.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    got: embedding.len(),
                }
                .into());
            }
        }
        Ok(embeddings)
    }
}

/// Maps a provider error onto the transient/permanent split.
fn classify(err: OpenAIError) -> EmbeddingError {
    match &err {
        OpenAIError::Reqwest(_) => EmbeddingError::Transient(err.to_string()),
        OpenAIError::ApiError(api) => {
            let message = api.message.to_lowercase();
            if message.contains("rate limit")
                || message.contains("overloaded")
                || message.contains("too many requests")
                || message.contains("timeout")
                || message.contains("server error")
                || message.contains("429")
                || message.contains("500")
                || message.contains("502")
                || message.contains("503")
            {
                EmbeddingError::Transient(err.to_string())
            } else {
                EmbeddingError::Provider(err.to_string())
            }
        }
        _ => EmbeddingError::Provider(err.to_string()),
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.request_batch(vec![text.to_string()]).await?;
        batch.pop().ok_or_else(|| {
            EmbeddingError::Provider("provider returned no embedding".to_string()).into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Fan batches out with bounded concurrency, then restore input
        // order by batch index.
        let batches: Vec<(usize, Vec<String>)> = texts
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .enumerate()
            .collect();

        let mut results: Vec<(usize, Vec<Vec<f32>>)> =
            futures_util::stream::iter(batches.into_iter().map(|(i, batch)| async move {
                let embeddings = self.request_batch(batch).await?;
                Ok::<_, crate::Error>((i, embeddings))
            }))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;

        results.sort_by_key(|(i, _)| *i);
        Ok(results.into_iter().flat_map(|(_, e)| e).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAiEmbedder {
        OpenAiEmbedder::new(&EmbeddingConfig::default())
    }

    #[test]
    fn test_batch_size_clamped() {
        let mut config = EmbeddingConfig::default();
        config.batch_size = 500;
        let provider = OpenAiEmbedder::new(&config);
        assert_eq!(provider.batch_size, MAX_EMBEDDING_BATCH);
    }

    #[test]
    fn test_model_name_reported() {
        assert_eq!(embedder().model_name(), "text-embedding-3-small");
    }

    #[test]
    fn test_classify_api_errors() {
        let transient = OpenAIError::ApiError(async_openai::error::ApiError {
            message: "Rate limit exceeded, retry after".to_string(),
            r#type: None,
            param: None,
            code: None,
        });
        assert!(classify(transient).is_transient());

        let permanent = OpenAIError::ApiError(async_openai::error::ApiError {
            message: "Invalid API key".to_string(),
            r#type: None,
            param: None,
            code: None,
        });
        assert!(!classify(permanent).is_transient());
    }
}
