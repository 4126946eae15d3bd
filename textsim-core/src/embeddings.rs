//! Embeddings module: hosted embedding vectors behind a narrow trait
//!
//! Provides an `EmbeddingBackend` trait with one production implementation:
//! - **OpenAI** - batched calls to an OpenAI-compatible `/embeddings` endpoint
//!
//! Scoring code only sees the trait, so tests substitute fixed vectors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::Retry;

use crate::openai::{self, ClientSettings};

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts in one call. The returned vectors are in the
    /// same order as `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Missing embedding for input {index}")]
    MissingEmbedding { index: usize },

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ============================================================================
// OpenAiEmbeddingClient
// ============================================================================

/// OpenAI embedding client - calls `{base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    settings: ClientSettings,
}

impl OpenAiEmbeddingClient {
    pub fn new(settings: ClientSettings) -> Result<Self, EmbeddingError> {
        if settings.api_key.trim().is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = settings.build_client()?;

        Ok(Self { client, settings })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.settings.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.settings.endpoint("embeddings"))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = openai::error_message(&error_body);
            let code = status.as_u16();

            tracing::error!(code = code, message = %message, "Embedding API error");

            return Err(EmbeddingError::Api { code, message });
        }

        let body: EmbeddingResponse = response.json().await?;
        order_by_index(body.data, texts.len())
    }
}

/// Place each returned vector at its `index`, rejecting gaps and extras.
fn order_by_index(
    data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: data.len(),
        });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        match slots.get_mut(item.index) {
            Some(slot) => *slot = Some(item.embedding),
            None => {
                return Err(EmbeddingError::CountMismatch {
                    expected,
                    actual: item.index + 1,
                })
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(EmbeddingError::MissingEmbedding { index }))
        .collect()
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let result = Retry::spawn(self.settings.retry_strategy(), || self.embed_once(texts)).await;

        if let Err(e) = &result {
            tracing::error!(
                attempts = self.settings.max_retries + 1,
                error = %e,
                "Embedding request failed"
            );
        }

        result
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Backend used when no API key is configured. Every call fails with
/// `MissingApiKey`, so scoring degrades instead of the server refusing to start.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEmbeddings;

#[async_trait]
impl EmbeddingBackend for UnconfiguredEmbeddings {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

// ============================================================================
// TESTS
// ============================================================================
