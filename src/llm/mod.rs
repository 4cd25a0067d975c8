//! Chat model capability and the OpenAI-compatible implementation.
//!
//! The synthesizer depends on [`ChatProvider`], not on a concrete
//! client, keeping the swap path to another provider cheap. The
//! production implementation runs a primary model with retry/backoff
//! and switches to a configured fallback model once on explicit
//! transient errors (rate limit, transient 5xx, timeout).

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use tracing::warn;

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// A completed chat call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Raw assistant message content.
    pub content: String,
    /// Model that actually served the call.
    pub model: String,
}

/// Capability trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends one system + user exchange and returns the assistant
    /// message.
    ///
    /// # Errors
    ///
    /// Returns a [`SynthesisError`]; transient variants have already
    /// been retried internally.
    async fn complete(&self, system: &str, user: &str)
    -> Result<ChatOutcome, SynthesisError>;
}

/// OpenAI-compatible chat provider with primary/fallback models.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    primary_model: String,
    fallback_model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiChat {
    /// Creates a provider from configuration. The credential comes
    /// from the standard environment variable, resolved by the client.
    #[must_use]
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            client: Client::new(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
            retry: RetryPolicy::with_max_retries(config.max_retries),
        }
    }

    async fn call_model(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<ChatOutcome, SynthesisError> {
        let timeout_secs = self.timeout.as_secs();
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .response_format(ResponseFormat::JsonObject)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| SynthesisError::Provider(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| SynthesisError::Provider(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| SynthesisError::Provider(e.to_string()))?;

        let response = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| SynthesisError::Timeout {
            seconds: timeout_secs,
        })?
        .map_err(classify)?;

        let model = response.model.clone();
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SynthesisError::Provider("empty completion".to_string()))?;

        Ok(ChatOutcome { content, model })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> Result<ChatOutcome, SynthesisError> {
        let primary = retry_with_backoff(self.retry, SynthesisError::is_transient, || {
            self.call_model(&self.primary_model, system, user)
        })
        .await;

        match primary {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_transient() => {
                warn!(
                    error = %e,
                    fallback = %self.fallback_model,
                    "primary model exhausted retries, switching to fallback"
                );
                self.call_model(&self.fallback_model, system, user).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Maps a provider error onto the transient/permanent split.
fn classify(err: OpenAIError) -> SynthesisError {
    match &err {
        OpenAIError::Reqwest(_) => SynthesisError::Transient(err.to_string()),
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
                SynthesisError::Transient(err.to_string())
            } else {
                SynthesisError::Provider(err.to_string())
            }
        }
        _ => SynthesisError::Provider(err.to_string()),
    }
}
