//! Search intent generation.
//!
//! Asks the chat model for five search queries a reader might type to find
//! the given text, returned as a JSON array of strings in the text's language.

use std::sync::Arc;

use thiserror::Error;

use crate::chat::{ChatBackend, ChatError, ChatMessage, CompletionRequest};
use crate::similarity::prepare_input;

const INTENT_PROMPT: &str = "You generate search intents. Given the user's text, write exactly 5 \
search queries a person might type into a search engine to find it. Use the same language as \
the text. Respond with a JSON array of 5 strings and nothing else.";

#[derive(Error, Debug)]
pub enum IntentError {
    #[error("{0}")]
    BadInput(String),

    #[error("Intent generation call failed: {0}")]
    UpstreamCallFailure(#[from] ChatError),

    #[error("Model returned malformed intents: {0}")]
    UpstreamParseFailure(String),
}

impl IntentError {
    /// Stable machine-readable kind for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::UpstreamCallFailure(_) => "upstream_call_failure",
            Self::UpstreamParseFailure(_) => "upstream_parse_failure",
        }
    }
}

/// Drop a surrounding markdown code fence (```json ... ```) if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse model output into intents. Anything but a JSON array of strings is
/// rejected; the number of items is not checked.
pub fn parse_intents(raw: &str) -> Result<Vec<String>, IntentError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| IntentError::UpstreamParseFailure(e.to_string()))?;

    let items = value
        .as_array()
        .ok_or_else(|| IntentError::UpstreamParseFailure("expected a JSON array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                IntentError::UpstreamParseFailure(format!("item {} is not a string", i))
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct IntentGenerator {
    backend: Arc<dyn ChatBackend>,
}

impl IntentGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, text: &str) -> Result<Vec<String>, IntentError> {
        let input = prepare_input(text);
        if input.is_empty() {
            return Err(IntentError::BadInput("text field is required".to_string()));
        }

        let request = CompletionRequest {
            messages: vec![ChatMessage::system(INTENT_PROMPT), ChatMessage::user(input)],
            max_tokens: 500,
            temperature: 0.7,
        };

        let raw = self.backend.complete(request).await?;

        let intents = parse_intents(&raw).map_err(|e| {
            tracing::warn!(error = %e, raw = %raw, "Could not parse intents from model output");
            e
        })?;

        if intents.len() != 5 {
            tracing::debug!(count = intents.len(), "Model returned an unexpected number of intents");
        }

        Ok(intents)
    }
}
