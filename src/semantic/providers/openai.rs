use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{http_client, read_json, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT, TEMPERATURE};
use crate::semantic::embeddings::{
    ensure_input, AiProvider, Capabilities, Completion, ProviderError, Usage,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completion and embedding API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        read_json(response).await
    }

    fn chat_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_OUTPUT_TOKENS,
        })
    }

    fn embedding_request(&self, text: &str) -> Value {
        json!({
            "model": self.embedding_model,
            "input": text,
        })
    }
}

fn parse_completion(resp: &Value) -> Result<Completion, ProviderError> {
    let text = resp
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message.content".into()))?;

    let usage = resp.get("usage").map(|u| {
        let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        Usage {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }
    });

    Ok(Completion {
        text: text.to_string(),
        usage,
    })
}

fn parse_embedding(resp: &Value) -> Result<Vec<f32>, ProviderError> {
    let values = resp
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing data[0].embedding".into()))?;

    let embedding = values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ProviderError::InvalidResponse("non-numeric embedding value".into()))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    if embedding.is_empty() {
        return Err(ProviderError::InvalidResponse("empty embedding".into()));
    }

    Ok(embedding)
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embed: true,
            complete: true,
        }
    }

    fn embedding_model(&self) -> Option<String> {
        Some(format!("openai/{}", self.embedding_model))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        ensure_input(text)?;
        let resp = self.post("/embeddings", &self.embedding_request(text)).await?;
        parse_embedding(&resp)
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError> {
        ensure_input(prompt)?;
        let resp = self.post("/chat/completions", &self.chat_request(prompt)).await?;
        parse_completion(&resp)
    }
}
