//! Similarity scoring: cosine similarity over hosted embeddings
//!
//! Pipeline for one pair of texts:
//! 1. Keep the first `MAX_INPUT_CHARS` characters of each text, then trim.
//! 2. Embed both in a single batched call (order preserved).
//! 3. cosine = dot(a, b) / (|a| * |b|), accumulated in f64.
//! 4. Scale to a percentage rounded to two decimals.
//!
//! Any failure along the way yields `SimilarityOutcome::Unavailable` instead
//! of an error; callers decide how to render that.

use std::sync::Arc;

use thiserror::Error;

use crate::embeddings::EmbeddingBackend;

/// Longest prefix (in characters) of any text sent to a hosted model.
pub const MAX_INPUT_CHARS: usize = 3000;

#[derive(Error, Debug, PartialEq)]
pub enum SimilarityError {
    #[error("Vector length mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Empty embedding vector")]
    EmptyVector,

    #[error("Zero-norm embedding vector")]
    ZeroNorm,
}

/// Result of scoring a pair of texts.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityOutcome {
    /// Percentage in [-100, 100], two decimals.
    Scored { score: f64 },
    /// Scoring could not be completed; `reason` is for logs and clients.
    Unavailable { reason: String },
}

impl SimilarityOutcome {
    /// The legacy rendering: unavailable scores collapse to `0.0`.
    pub fn score_or_zero(&self) -> f64 {
        match self {
            Self::Scored { score } => *score,
            Self::Unavailable { .. } => 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Scored { .. })
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Normalize a text before it is sent to a hosted model.
pub fn prepare_input(text: &str) -> String {
    truncate_chars(text, MAX_INPUT_CHARS).trim().to_string()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Err(SimilarityError::ZeroNorm);
    }

    Ok(dot / denom)
}

/// Cosine in [-1, 1] to a percentage with two decimals.
pub fn to_percentage(cosine: f64) -> f64 {
    (cosine * 100.0 * 100.0).round() / 100.0
}

/// Scores text pairs against an embedding backend.
#[derive(Clone)]
pub struct SimilarityScorer {
    backend: Arc<dyn EmbeddingBackend>,
}

impl SimilarityScorer {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    pub async fn score(&self, text1: &str, text2: &str) -> SimilarityOutcome {
        let inputs = vec![prepare_input(text1), prepare_input(text2)];

        let vectors = match self.backend.embed_batch(&inputs).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Embedding call failed, score unavailable");
                return SimilarityOutcome::Unavailable {
                    reason: format!("embedding failed: {}", e),
                };
            }
        };

        let (emb1, emb2) = match vectors.as_slice() {
            [a, b] => (a, b),
            other => {
                tracing::warn!(count = other.len(), "Expected two embeddings, score unavailable");
                return SimilarityOutcome::Unavailable {
                    reason: format!("expected 2 embeddings, got {}", other.len()),
                };
            }
        };

        match cosine_similarity(emb1, emb2) {
            Ok(cos) => SimilarityOutcome::Scored {
                score: to_percentage(cos),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Similarity calculation failed, score unavailable");
                SimilarityOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
