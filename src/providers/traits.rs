use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One turn in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Failures the reply pipeline branches on. Everything else travels as
/// plain `anyhow` context.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No credential configured. The pipeline turns this into a
    /// user-visible setup notice instead of a generic apology.
    #[error("{provider} API key not set. Set RAGLINE_API_KEY or add api_key to config.toml.")]
    MissingApiKey { provider: String },
    /// The provider answered with a non-success status.
    #[error("{provider} API error from /v1/chat/completions ({status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },
}

/// Language model seam. Implementations are stateless and shared
/// across concurrent message tasks via `Arc`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one chat completion and return the assistant text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;

    /// Cheap readiness probe run once at startup. Default: assume ready.
    async fn warmup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
