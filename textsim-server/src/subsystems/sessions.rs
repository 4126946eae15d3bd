//! Session store subsystem: upsert protocol for `session_records`
//!
//! - First save for a `session_id` creates the row and, when the payload has a
//!   non-empty `main_text`, asks the summarizer for a title.
//! - Later saves replace `data` wholesale and never touch `summary`.
//! - A failed summary is logged and the session is stored with `summary = NULL`.
//!
//! Two concurrent first saves may both summarize; the insert resolves on
//! `ON CONFLICT`, so the first row's summary is the one that survives.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use textsim_core::{SessionRecord, Summarizer, TextsimError};
use thiserror::Error;

use super::store::PgStore;

const RETURNING: &str = "RETURNING id, session_id, data, summary, created_at, updated_at";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] TextsimError),
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, TextsimError>;

    /// Create the row. If another writer created it first, only `data` is
    /// overwritten and the existing summary is kept.
    async fn insert(
        &self,
        session_id: &str,
        data: &str,
        summary: Option<&str>,
    ) -> Result<SessionRecord, TextsimError>;

    async fn update_data(&self, session_id: &str, data: &str) -> Result<SessionRecord, TextsimError>;
}

/// What `get_session_data` hands back to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub data: Value,
    pub summary: Option<String>,
}

/// Python-style truthiness: null, false, 0, "", [] and {} count as missing.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn main_text(data: &Value) -> Option<&str> {
    data.get("main_text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
}

/// Create or update the session, returning the stored record.
pub async fn save_session(
    repo: &dyn SessionRepository,
    summarizer: &Summarizer,
    session_id: Option<&str>,
    data: Option<&Value>,
) -> Result<SessionRecord, SessionError> {
    // Whitespace-only ids are rejected, but a valid id is keyed verbatim.
    let (session_id, data) = match (session_id, data) {
        (Some(id), Some(d)) if !id.trim().is_empty() && !is_blank(d) => (id, d),
        _ => return Err(SessionError::Validation("Missing session_id or data".to_string())),
    };

    let serialized = serde_json::to_string(data).map_err(TextsimError::from)?;

    if repo.find(session_id).await?.is_some() {
        let record = repo.update_data(session_id, &serialized).await?;
        tracing::info!(session_id = %session_id, "Session data updated");
        return Ok(record);
    }

    let summary = match main_text(data) {
        Some(text) => match summarizer.summarize(text).await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Summary generation failed, storing session without summary");
                None
            }
        },
        None => None,
    };

    let record = repo
        .insert(session_id, &serialized, summary.as_deref())
        .await?;
    tracing::info!(session_id = %session_id, has_summary = record.summary.is_some(), "Session created");
    Ok(record)
}

/// Look up a session. `Ok(None)` is a normal miss, not an error.
pub async fn get_session(
    repo: &dyn SessionRepository,
    session_id: Option<&str>,
) -> Result<Option<SessionView>, SessionError> {
    let session_id = match session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(SessionError::Validation("Missing session_id".to_string())),
    };

    Ok(repo.find(session_id).await?.map(|record| SessionView {
        data: record.data_json(),
        summary: record.summary,
    }))
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, TextsimError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, session_id, data, summary, created_at, updated_at
             FROM session_records WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(record)
    }

    async fn insert(
        &self,
        session_id: &str,
        data: &str,
        summary: Option<&str>,
    ) -> Result<SessionRecord, TextsimError> {
        let sql = format!(
            "INSERT INTO session_records (session_id, data, summary)
             VALUES ($1, $2, $3)
             ON CONFLICT (session_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
             {}",
            RETURNING
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .bind(data)
            .bind(summary)
            .fetch_one(self.pool())
            .await?;
        Ok(record)
    }

    async fn update_data(&self, session_id: &str, data: &str) -> Result<SessionRecord, TextsimError> {
        let sql = format!(
            "UPDATE session_records SET data = $2, updated_at = now()
             WHERE session_id = $1
             {}",
            RETURNING
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .bind(data)
            .fetch_one(self.pool())
            .await?;
        Ok(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================
