//! Provider capability interface.
//!
//! The index never knows which vendor is active. It only asks a provider for
//! its [`Capabilities`] and calls [`AiProvider::embed`]. Vendors live in
//! `providers/`; [`build_provider`] picks one from configuration once, at
//! startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{AiServiceConfig, ProviderKind};
use crate::semantic::providers::{gemini::GeminiProvider, openai::OpenAiProvider};

/// Errors reported by a vendor provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl ProviderError {
    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 | 403 => ProviderError::Auth(message),
            429 => ProviderError::Quota(message),
            400 | 422 => ProviderError::InvalidInput(message),
            408 | 504 => ProviderError::Timeout,
            _ => ProviderError::Network(format!("{status}: {message}")),
        }
    }
}

/// Pull a human readable message out of a vendor error body.
///
/// Both vendors answer with `{"error": {"message": ...}}`; anything else is
/// returned verbatim.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Reject input no vendor would accept.
pub fn ensure_input(text: &str) -> Result<(), ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::InvalidInput("empty input".to_string()));
    }
    Ok(())
}

/// Operations a provider actually implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub embed: bool,
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Vendor name for logging
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Identifies the embedding space, e.g. `openai/text-embedding-ada-002`.
    /// Vectors produced under different identities are never compared.
    fn embedding_model(&self) -> Option<String>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError>;
}

/// Build the configured provider.
///
/// Returns `Ok(None)` when no api key is set: the caller runs without AI
/// capabilities rather than failing.
pub fn build_provider(
    config: &AiServiceConfig,
) -> Result<Option<Arc<dyn AiProvider>>, ProviderError> {
    let api_key = config.api_key.trim();
    if api_key.is_empty() {
        log::info!("no api key configured, AI capabilities disabled");
        return Ok(None);
    }

    let timeout = Duration::from_secs(config.timeout_secs);

    let provider: Arc<dyn AiProvider> = match config.provider {
        ProviderKind::OpenAi => {
            let mut provider = OpenAiProvider::new(
                api_key,
                &config.model,
                &config.embedding_model,
                timeout,
            )?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::Gemini => {
            let mut provider = GeminiProvider::new(api_key, &config.model, timeout)?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
    };

    log::info!(
        "using {} provider (embeddings: {})",
        provider.name(),
        provider.capabilities().embed
    );

    Ok(Some(provider))
}
