//! Session title generation.
//!
//! A session's `main_text` is condensed into a short title by the chat model.
//! The model is asked for at most 30 characters; longer answers are cut to
//! 25 characters plus a trailing marker. Lengths count Unicode scalar values.

use std::sync::Arc;

use crate::chat::{ChatBackend, ChatError, ChatMessage, CompletionRequest};
use crate::similarity::prepare_input;

pub const SUMMARY_MAX_CHARS: usize = 30;
pub const SUMMARY_KEEP_CHARS: usize = 25;
pub const TRUNCATION_MARKER: char = '…';

const SUMMARY_PROMPT: &str = "You write short titles. Summarize the user's text as a title of at most \
30 characters, in the same language as the text. Reply with the title only, \
no quotes and no trailing punctuation.";

/// Trim and, when over `SUMMARY_MAX_CHARS`, keep the first
/// `SUMMARY_KEEP_CHARS` characters followed by `TRUNCATION_MARKER`.
pub fn truncate_summary(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= SUMMARY_MAX_CHARS {
        return trimmed.to_string();
    }

    let mut out: String = trimmed.chars().take(SUMMARY_KEEP_CHARS).collect();
    out.push(TRUNCATION_MARKER);
    out
}

#[derive(Clone)]
pub struct Summarizer {
    backend: Arc<dyn ChatBackend>,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn summarize(&self, text: &str) -> Result<String, ChatError> {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(SUMMARY_PROMPT),
                ChatMessage::user(prepare_input(text)),
            ],
            max_tokens: 60,
            temperature: 0.3,
        };

        let raw = self.backend.complete(request).await?;
        let summary = truncate_summary(&raw);
        tracing::debug!(backend = self.backend.name(), summary = %summary, "Generated session summary");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedChat {
        reply: String,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatBackend for CannedChat {
        async fn complete(&self, request: CompletionRequest) -> Result<String, ChatError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn canned(reply: &str) -> Arc<CannedChat> {
        Arc::new(CannedChat {
            reply: reply.to_string(),
            last_request: Mutex::new(None),
        })
    }

    #[test]
    fn test_short_summary_is_kept_verbatim() {
        let twenty = "a".repeat(20);
        assert_eq!(truncate_summary(&twenty), twenty);
    }

    #[test]
    fn test_exactly_thirty_chars_is_not_truncated() {
        let thirty = "b".repeat(30);
        assert_eq!(truncate_summary(&thirty), thirty);
    }

    #[test]
    fn test_long_summary_is_cut_to_25_plus_marker() {
        let forty = "c".repeat(40);
        let out = truncate_summary(&forty);
        assert_eq!(out.chars().count(), 26);
        assert_eq!(out, format!("{}…", "c".repeat(25)));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "語".repeat(31);
        let out = truncate_summary(&text);
        assert_eq!(out, format!("{}…", "語".repeat(25)));
    }

    #[test]
    fn test_whitespace_is_trimmed_before_measuring() {
        assert_eq!(truncate_summary("   Quarterly report  \n"), "Quarterly report");
    }

    #[tokio::test]
    async fn test_summarize_post_processes_model_output() {
        let backend = canned(&"d".repeat(40));
        let summarizer = Summarizer::new(backend.clone());

        let summary = summarizer.summarize("some main text").await.unwrap();
        assert_eq!(summary.chars().count(), 26);

        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "some main text");
    }
}
