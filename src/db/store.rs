use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::legal_prompts::{LegalPrompt, NewLegalPrompt};
use crate::db::sql_state::SqlState;

/// One result row: column name to scalar, in select-list order.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct DbError {
    pub code: SqlState,
    pub message: String,
}

impl DbError {
    pub fn new(code: SqlState, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SqlState::Other, message)
    }
}

/// What happened when a statement ran. A missing table is reported as its own
/// outcome so the caller can create the schema without inspecting error text.
#[derive(Debug)]
pub enum FetchOutcome {
    Rows(Vec<Row>),
    SchemaMissing,
    Failed(DbError),
}

#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn fetch(&self, sql: &str) -> FetchOutcome;

    /// Creates the table if needed and seeds it when empty. Returns the number
    /// of rows seeded. Safe to call concurrently and repeatedly.
    async fn ensure_schema(&self) -> Result<usize, DbError>;

    async fn insert_prompt(&self, prompt: NewLegalPrompt) -> Result<LegalPrompt, DbError>;

    async fn list_prompts(&self, limit: u32, offset: u32) -> Result<Vec<LegalPrompt>, DbError>;
}
