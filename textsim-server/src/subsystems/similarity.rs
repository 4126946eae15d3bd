//! Similarity subsystem: scores a pair and appends it to `text_pairs`
//!
//! The pair is written after scoring regardless of outcome. `text_pairs` is an
//! insert-only history; a failed write is logged and does not affect the score.

use async_trait::async_trait;
use textsim_core::models::text_pair::UNKNOWN_SESSION;
use textsim_core::{SimilarityOutcome, SimilarityScorer, TextPair, TextsimError};

use super::store::PgStore;

#[async_trait]
pub trait TextPairRepository: Send + Sync {
    async fn record(&self, text1: &str, text2: &str, session_id: &str)
        -> Result<TextPair, TextsimError>;
}

pub async fn score_pair(
    scorer: &SimilarityScorer,
    pairs: &dyn TextPairRepository,
    session_id: Option<&str>,
    text1: &str,
    text2: &str,
) -> SimilarityOutcome {
    let outcome = scorer.score(text1, text2).await;

    let session_id = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SESSION);

    match pairs.record(text1, text2, session_id).await {
        Ok(pair) => tracing::info!(
            id = %pair.id,
            session_id = %session_id,
            available = outcome.is_available(),
            score = outcome.score_or_zero(),
            "Recorded text pair"
        ),
        Err(e) => tracing::error!(session_id = %session_id, error = %e, "Failed to record text pair"),
    }

    outcome
}

#[async_trait]
impl TextPairRepository for PgStore {
    async fn record(
        &self,
        text1: &str,
        text2: &str,
        session_id: &str,
    ) -> Result<TextPair, TextsimError> {
        let pair = sqlx::query_as::<_, TextPair>(
            "INSERT INTO text_pairs (text1, text2, session_id)
             VALUES ($1, $2, $3)
             RETURNING id, text1, text2, session_id, created_at",
        )
        .bind(text1)
        .bind(text2)
        .bind(session_id)
        .fetch_one(self.pool())
        .await?;
        Ok(pair)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use textsim_core::{EmbeddingBackend, EmbeddingError};
    use uuid::Uuid;

    #[derive(Default)]
    pub(crate) struct MemoryPairs {
        pub rows: Mutex<Vec<TextPair>>,
        pub fail: bool,
    }

    #[async_trait]
    impl TextPairRepository for MemoryPairs {
        async fn record(
            &self,
            text1: &str,
            text2: &str,
            session_id: &str,
        ) -> Result<TextPair, TextsimError> {
            if self.fail {
                return Err(TextsimError::Other("disk full".to_string()));
            }
            let pair = TextPair {
                id: Uuid::new_v4(),
                text1: text1.to_string(),
                text2: text2.to_string(),
                session_id: session_id.to_string(),
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(pair.clone());
            Ok(pair)
        }
    }

    /// Embeds any text as the same fixed vector.
    pub(crate) struct ConstantEmbedding(pub Vec<f32>);

    #[async_trait]
    impl EmbeddingBackend for ConstantEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    pub(crate) struct DownEmbedding;

    #[async_trait]
    impl EmbeddingBackend for DownEmbedding {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::MissingApiKey)
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_score_pair_records_raw_texts() {
        let scorer = SimilarityScorer::new(Arc::new(ConstantEmbedding(vec![1.0, 0.0])));
        let pairs = MemoryPairs::default();

        let outcome = score_pair(&scorer, &pairs, Some("s-1"), "  left ", "right").await;
        assert_eq!(outcome, SimilarityOutcome::Scored { score: 100.0 });

        let rows = pairs.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text1, "  left ");
        assert_eq!(rows[0].session_id, "s-1");
    }

    #[tokio::test]
    async fn test_score_pair_defaults_session_to_unknown() {
        let scorer = SimilarityScorer::new(Arc::new(ConstantEmbedding(vec![1.0, 0.0])));
        let pairs = MemoryPairs::default();

        score_pair(&scorer, &pairs, None, "a", "b").await;
        score_pair(&scorer, &pairs, Some("  "), "a", "b").await;

        let rows = pairs.rows.lock().unwrap();
        assert!(rows.iter().all(|r| r.session_id == UNKNOWN_SESSION));
    }

    #[tokio::test]
    async fn test_score_pair_records_even_when_unavailable() {
        let scorer = SimilarityScorer::new(Arc::new(DownEmbedding));
        let pairs = MemoryPairs::default();

        let outcome = score_pair(&scorer, &pairs, Some("s-2"), "a", "b").await;
        assert!(!outcome.is_available());
        assert_eq!(pairs.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_failure_does_not_change_score() {
        let scorer = SimilarityScorer::new(Arc::new(ConstantEmbedding(vec![0.3, 0.4])));
        let pairs = MemoryPairs {
            fail: true,
            ..Default::default()
        };

        let outcome = score_pair(&scorer, &pairs, Some("s-3"), "a", "b").await;
        assert_eq!(outcome.score_or_zero(), 100.0);
    }
}
