use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted session payload, unique per `session_id`.
///
/// `data` is the caller's JSON object serialized to text. `summary` is set
/// only when the record is first created and is never rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub session_id: String,
    pub data: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Decode `data` back into JSON. Rows written outside this service may
    /// hold plain text, which comes back as a JSON string.
    pub fn data_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.data)
            .unwrap_or_else(|_| serde_json::Value::String(self.data.clone()))
    }
}
