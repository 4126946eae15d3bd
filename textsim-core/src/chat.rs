//! Chat completion module: hosted language model behind a narrow trait
//!
//! Summaries and search intents are both produced by a single-turn chat
//! completion. `ChatBackend` is the seam; `OpenAiChatClient` talks to an
//! OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::Retry;

use crate::openai::{self, ClientSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single role-tagged message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Completion response had no message content")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one completion and return the generated text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ChatError>;

    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// OpenAiChatClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    settings: ClientSettings,
}

impl OpenAiChatClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ChatError> {
        if settings.api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }

        let client = settings.build_client()?;

        Ok(Self { client, settings })
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let body = ChatRequestBody {
            model: &self.settings.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.settings.endpoint("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = openai::error_message(&error_body);
            let code = status.as_u16();

            tracing::error!(code = code, message = %message, "Chat completion API error");

            return Err(ChatError::Api { code, message });
        }

        let parsed: ChatResponseBody = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ChatError::EmptyResponse)
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ChatError> {
        let result =
            Retry::spawn(self.settings.retry_strategy(), || self.complete_once(&request)).await;

        if let Err(e) = &result {
            tracing::error!(
                attempts = self.settings.max_retries + 1,
                error = %e,
                "Chat completion failed"
            );
        }

        result
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Chat backend used when no API key is configured; every completion fails
/// with `MissingApiKey`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredChat;

#[async_trait]
impl ChatBackend for UnconfiguredChat {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ChatError> {
        Err(ChatError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiChatClient {
        OpenAiChatClient::new(ClientSettings {
            api_key: "test-api-key".to_string(),
            base_url: server.uri(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 5,
            max_retries: 0,
            retry_delay_ms: 10,
        })
        .expect("Failed to create client")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hello")],
            max_tokens: 60,
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_content() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server);

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ],
                "max_tokens": 60,
                "temperature": 0.3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "hi there" }, "finish_reason": "stop" }
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let text = client.complete(request()).await.unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_complete_maps_server_error() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&mock_server)
            .await;

        match client.complete(request()).await {
            Err(ChatError::Api { code, message }) => {
                assert_eq!(code, 503);
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_empty_response() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.complete(request()).await,
            Err(ChatError::EmptyResponse)
        ));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::user("x")).unwrap();
        assert_eq!(json["role"], "user");
    }

    #[tokio::test]
    async fn test_unconfigured_chat_reports_missing_key() {
        let err = UnconfiguredChat.complete(request()).await.unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
    }
}
