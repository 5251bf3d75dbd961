use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::sql_state::SqlState;
use crate::db::{DbError, FetchOutcome, QueryStore, Row};
use crate::query::error::QueryError;
use crate::sql::{validate_query, Verdict};

/// Rows plus the column list derived from the first row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    AfterSchemaCreation,
}

/// Runs validated SELECTs, creating the table on first use.
pub struct QueryExecutor {
    store: Arc<dyn QueryStore>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn QueryStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let mut attempt = Attempt::First;

        loop {
            // Re-checked on every attempt, including the retry.
            if let Verdict::Invalid(reason) = validate_query(sql) {
                warn!("Refusing to execute query: {}", reason);
                return Err(QueryError::ValidationFailure(reason));
            }

            debug!("Executing ({:?}): {}", attempt, sql);
            let outcome = tokio::time::timeout(self.timeout, self.store.fetch(sql))
                .await
                .map_err(|_| {
                    warn!("Query exceeded {:?}: {}", self.timeout, sql);
                    QueryError::QueryTimeout(self.timeout.as_secs())
                })?;

            match (outcome, attempt) {
                (FetchOutcome::Rows(rows), _) => {
                    info!("Query returned {} rows", rows.len());
                    return Ok(QueryResult::from_rows(rows));
                }
                (FetchOutcome::SchemaMissing, Attempt::First) => {
                    info!("Table missing, creating and seeding it before retrying");
                    tokio::time::timeout(self.timeout, self.store.ensure_schema())
                        .await
                        .map_err(|_| QueryError::QueryTimeout(self.timeout.as_secs()))?
                        .map_err(map_db_error)?;
                    attempt = Attempt::AfterSchemaCreation;
                }
                (FetchOutcome::SchemaMissing, Attempt::AfterSchemaCreation) => {
                    error!("Table still missing after schema creation");
                    return Err(QueryError::database(SqlState::UndefinedTable));
                }
                (FetchOutcome::Failed(err), _) => return Err(map_db_error(err)),
            }
        }
    }
}

fn map_db_error(err: DbError) -> QueryError {
    error!("Database error {}: {}", err.code, err.message);
    QueryError::database(err.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::legal_prompts::{LegalPrompt, NewLegalPrompt};
    use crate::db::DuckDbStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Store that replays a fixed list of outcomes.
    struct ScriptedStore {
        outcomes: Mutex<Vec<FetchOutcome>>,
        fetches: AtomicUsize,
        schema_calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedStore {
        fn new(mut outcomes: Vec<FetchOutcome>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                fetches: AtomicUsize::new(0),
                schema_calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl QueryStore for ScriptedStore {
        async fn fetch(&self, _sql: &str) -> FetchOutcome {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(FetchOutcome::Rows(Vec::new()))
        }

        async fn ensure_schema(&self) -> Result<usize, DbError> {
            self.schema_calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }

        async fn insert_prompt(&self, _prompt: NewLegalPrompt) -> Result<LegalPrompt, DbError> {
            Err(DbError::other("not supported"))
        }

        async fn list_prompts(&self, _limit: u32, _offset: u32) -> Result<Vec<LegalPrompt>, DbError> {
            Ok(Vec::new())
        }
    }

    fn executor(store: Arc<dyn QueryStore>) -> QueryExecutor {
        QueryExecutor::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn creates_and_seeds_missing_table() {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        let result = executor(store)
            .execute("SELECT category, COUNT(*) FROM legalprompt GROUP BY category")
            .await
            .unwrap();

        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[0], "category");
        for row in &result.rows {
            let count = row.values().nth(1).and_then(Value::as_i64);
            assert_eq!(count, Some(1));
        }
    }

    #[tokio::test]
    async fn empty_results_have_no_columns() {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        let result = executor(store)
            .execute("SELECT name FROM legalprompt WHERE category = 'Tax'")
            .await
            .unwrap();
        assert!(result.rows.is_empty());
        assert!(result.columns.is_empty());
    }

    #[tokio::test]
    async fn revalidates_before_executing() {
        let store = Arc::new(ScriptedStore::new(Vec::new()));
        let err = executor(store.clone())
            .execute("DROP TABLE legalprompt")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::ValidationFailure(_)));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_exactly_once() {
        let store = Arc::new(ScriptedStore::new(vec![
            FetchOutcome::SchemaMissing,
            FetchOutcome::SchemaMissing,
            FetchOutcome::Rows(Vec::new()),
        ]));
        let err = executor(store.clone())
            .execute("SELECT * FROM legalprompt")
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::DatabaseError { code: SqlState::UndefinedTable, .. }));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(store.schema_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn maps_engine_errors_to_user_messages() {
        let store = Arc::new(ScriptedStore::new(vec![FetchOutcome::Failed(DbError::new(
            SqlState::UndefinedColumn,
            "Binder Error: Referenced column \"colour\" not found",
        ))]));
        let err = executor(store).execute("SELECT colour FROM legalprompt").await.unwrap_err();
        assert_eq!(err.to_string(), "The query references a column that does not exist");

        let store = Arc::new(ScriptedStore::new(vec![FetchOutcome::Failed(DbError::other("boom"))]));
        let err = executor(store).execute("SELECT 1").await.unwrap_err();
        assert_eq!(err.to_string(), "An unexpected database error occurred");
    }

    #[tokio::test]
    async fn slow_queries_time_out() {
        let mut store = ScriptedStore::new(Vec::new());
        store.delay = Duration::from_secs(2);
        let executor = QueryExecutor::new(Arc::new(store), Duration::from_millis(50));

        let err = executor.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, QueryError::QueryTimeout(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_query_frees_the_pool() {
        let store = Arc::new(DuckDbStore::open(":memory:", 1).unwrap());
        let executor = QueryExecutor::new(store, Duration::from_secs(1));

        let err = executor
            .execute("SELECT SUM(range % 7) AS s FROM range(4000000000)")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::QueryTimeout(1)));

        let result = executor.execute("SELECT 1 AS one").await.unwrap();
        assert_eq!(result.rows[0]["one"], Value::from(1));
    }
}
