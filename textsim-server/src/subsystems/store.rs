//! Postgres-backed persistence for sessions and the text-pair history.
//!
//! `PgStore` implements both `SessionRepository` and `TextPairRepository`;
//! the impls live next to the traits in their subsystems.

use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
