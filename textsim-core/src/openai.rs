//! Shared plumbing for the OpenAI-compatible HTTP clients.
//!
//! Both the embedding and chat completion clients speak the same wire
//! conventions: bearer authentication, a `base_url` ending in `/v1`, and
//! errors shaped as `{"error": {"message": ...}}`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

use crate::config::OpenAiConfig;

/// Connection settings for one OpenAI-compatible endpoint + model.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ClientSettings {
    /// Settings for the embedding model, using an already-resolved API key.
    pub fn for_embeddings(config: &OpenAiConfig, api_key: impl Into<String>) -> Self {
        Self::with_model(config, api_key.into(), config.embedding_model.clone())
    }

    /// Settings for the chat model, using an already-resolved API key.
    pub fn for_chat(config: &OpenAiConfig, api_key: impl Into<String>) -> Self {
        Self::with_model(config, api_key.into(), config.chat_model.clone())
    }

    fn with_model(config: &OpenAiConfig, api_key: String, model: String) -> Self {
        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            timeout_seconds: config.timeout_seconds,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub(crate) fn build_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()
    }

    /// Backoff delays between attempts. `max_retries = 0` means a single attempt.
    pub(crate) fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull a readable message out of a non-2xx body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_api_detail() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_settings_strip_trailing_slash() {
        let config = OpenAiConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..OpenAiConfig::default()
        };
        let settings = ClientSettings::for_chat(&config, "k");
        assert_eq!(settings.endpoint("chat/completions"), "http://localhost:1234/v1/chat/completions");
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn test_zero_retries_yields_no_delays() {
        let settings = ClientSettings::for_embeddings(&OpenAiConfig::default(), "k");
        assert_eq!(settings.retry_strategy().count(), 0);
    }
}
