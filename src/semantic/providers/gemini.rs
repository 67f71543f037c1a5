use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{http_client, read_json, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::semantic::embeddings::{
    ensure_input, AiProvider, Capabilities, Completion, ProviderError,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1";
const TOP_P: f32 = 0.95;

/// Gemini `generateContent` API. Completions only: no embedding endpoint is
/// wired up, so the provider advertises `embed: false`.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, self.model
        )
    }

    fn generate_request(prompt: &str) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
                "topP": TOP_P,
            }
        })
    }
}

fn parse_generation(resp: &Value) -> Result<Completion, ProviderError> {
    let text = resp
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("missing candidates[0].content.parts[0].text".into())
        })?;

    // generateContent does not report token usage
    Ok(Completion {
        text: text.to_string(),
        usage: None,
    })
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embed: false,
            complete: true,
        }
    }

    fn embedding_model(&self) -> Option<String> {
        None
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.name(),
            operation: "embeddings",
        })
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError> {
        ensure_input(prompt)?;

        let url = self.generate_url();
        log::debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::generate_request(prompt))
            .send()
            .await?;

        let resp = read_json(response).await?;
        parse_generation(&resp)
    }
}
