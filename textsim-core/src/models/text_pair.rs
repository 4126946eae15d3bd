use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session id recorded when a similarity request arrives without one.
pub const UNKNOWN_SESSION: &str = "unknown";

/// One similarity request, kept as an append-only history row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TextPair {
    pub id: Uuid,
    pub text1: String,
    pub text2: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}
