pub mod gemini;
pub mod openai;

use std::time::Duration;

use crate::semantic::embeddings::ProviderError;

/// Shown to the completion model before every prompt
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for a note-taking application.";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Shared HTTP client setup for vendor providers.
fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ProviderError::Network(format!("failed to build http client: {err}")))
}

/// Read a response body, turning non-success statuses into errors.
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ProviderError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = crate::semantic::embeddings::error_message(&text);
        log::warn!("provider request failed: status={status} message={message}");
        return Err(ProviderError::from_status(status, message));
    }

    serde_json::from_str(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        ProviderError::InvalidResponse(err.to_string())
    })
}
