use async_trait::async_trait;
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{params, Connection};
use r2d2::Pool;
use serde_json::{Number, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::legal_prompts::{
    self, LegalPrompt, NewLegalPrompt, CREATE_SEQUENCE_SQL, CREATE_TABLE_SQL, SEED_SQL,
    SELECT_COLUMNS, TABLE_NAME,
};
use crate::db::sql_state::SqlState;
use crate::db::store::{DbError, FetchOutcome, QueryStore, Row};

/// [`QueryStore`] backed by a pooled DuckDB database.
pub struct DuckDbStore {
    pool: Pool<DuckDBConnectionManager>,
}

type PromptRecord = (i32, String, String, String, String, Option<String>);

impl DuckDbStore {
    pub fn open(connection_string: &str, pool_size: u32) -> Result<Self, DbError> {
        let manager = DuckDBConnectionManager::new(connection_string).map_err(engine_error)?;
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| DbError::other(format!("Failed to build connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, DbError> {
        Self::open(":memory:", 2)
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    ///
    /// Dropping the returned future before it resolves (a timeout, for
    /// example) interrupts the statement, so the connection goes back to the
    /// pool instead of staying busy.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let cancel = CancelOnDrop::default();
        let slot = Arc::clone(&cancel.slot);

        let task = tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| DbError::other(format!("Failed to get DB connection: {}", e)))?;

            {
                let mut slot = lock(&slot);
                if slot.cancelled {
                    return Err(DbError::new(SqlState::QueryCanceled, "Cancelled before start"));
                }
                let handle = conn.interrupt_handle();
                slot.interrupt = Some(Box::new(move || handle.interrupt()));
            }

            let result = f(&conn);
            lock(&slot).interrupt = None;
            result
        });

        let result = task
            .await
            .map_err(|e| DbError::other(format!("Database task execution failed: {}", e)))?;
        drop(cancel);
        result
    }
}

type Interrupt = Box<dyn Fn() + Send>;

#[derive(Default)]
struct CancelState {
    cancelled: bool,
    interrupt: Option<Interrupt>,
}

/// Interrupts the statement registered in `slot` when dropped while armed.
#[derive(Default)]
struct CancelOnDrop {
    slot: Arc<Mutex<CancelState>>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if let Some(interrupt) = slot.interrupt.take() {
            warn!("Interrupting abandoned database statement");
            interrupt();
        } else {
            // Finished already, or still waiting for a connection.
            slot.cancelled = true;
        }
    }
}

fn lock(slot: &Mutex<CancelState>) -> MutexGuard<'_, CancelState> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl QueryStore for DuckDbStore {
    async fn fetch(&self, sql: &str) -> FetchOutcome {
        let sql = sql.to_string();
        match self.with_connection(move |conn| run_select(conn, &sql)).await {
            Ok(rows) => FetchOutcome::Rows(rows),
            Err(err) if is_missing_prompt_table(&err) => {
                debug!("Table {} does not exist yet", TABLE_NAME);
                FetchOutcome::SchemaMissing
            }
            Err(err) => FetchOutcome::Failed(err),
        }
    }

    async fn ensure_schema(&self) -> Result<usize, DbError> {
        self.with_connection(ensure_schema_blocking).await
    }

    async fn insert_prompt(&self, prompt: NewLegalPrompt) -> Result<LegalPrompt, DbError> {
        self.with_connection(move |conn| {
            ensure_schema_blocking(conn)?;

            let id: i32 = conn
                .query_row(
                    r#"INSERT INTO legalprompt (name, prompt, category, "systemMessage")
                       VALUES (?, ?, ?, ?) RETURNING id"#,
                    params![prompt.name, prompt.prompt, prompt.category, prompt.system_message],
                    |row| row.get(0),
                )
                .map_err(engine_error)?;

            let sql = format!("SELECT {} FROM legalprompt WHERE id = ?", SELECT_COLUMNS);
            let record = conn
                .query_row(&sql, params![id], read_prompt_record)
                .map_err(engine_error)?;

            info!("Inserted legal prompt {}", id);
            into_prompt(record)
        })
        .await
    }

    async fn list_prompts(&self, limit: u32, offset: u32) -> Result<Vec<LegalPrompt>, DbError> {
        self.with_connection(move |conn| {
            ensure_schema_blocking(conn)?;

            let sql = format!(
                "SELECT {} FROM legalprompt ORDER BY id LIMIT ? OFFSET ?",
                SELECT_COLUMNS
            );
            let (limit, offset) = (i64::from(limit), i64::from(offset));
            let mut stmt = conn.prepare(&sql).map_err(engine_error)?;
            let records = stmt
                .query_map(params![limit, offset], read_prompt_record)
                .map_err(engine_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(engine_error)?;

            records.into_iter().map(into_prompt).collect()
        })
        .await
    }
}

fn engine_error(err: duckdb::Error) -> DbError {
    let message = err.to_string();
    DbError::new(SqlState::classify_duckdb(&message), message)
}

fn is_missing_prompt_table(err: &DbError) -> bool {
    err.code == SqlState::UndefinedTable && err.message.to_lowercase().contains(TABLE_NAME)
}

const SCHEMA_ATTEMPTS: u32 = 5;
const SCHEMA_BACKOFF: Duration = Duration::from_millis(20);

/// Creates and seeds the table. Concurrent callers on other connections can
/// hit write-write conflicts here; the statements are idempotent, so a
/// conflicting caller backs off and runs them again.
fn ensure_schema_blocking(conn: &Connection) -> Result<usize, DbError> {
    let mut attempt = 1;
    loop {
        match create_and_seed(conn) {
            Ok(seeded) => {
                if seeded > 0 {
                    info!("Created table {} and seeded {} rows", TABLE_NAME, seeded);
                }
                return Ok(seeded);
            }
            Err(e) if attempt < SCHEMA_ATTEMPTS => {
                warn!("Concurrent schema setup detected (attempt {}): {}", attempt, e);
                std::thread::sleep(SCHEMA_BACKOFF * attempt);
                attempt += 1;
            }
            Err(e) => return Err(engine_error(e)),
        }
    }
}

fn create_and_seed(conn: &Connection) -> duckdb::Result<usize> {
    conn.execute_batch(CREATE_SEQUENCE_SQL)?;
    conn.execute_batch(CREATE_TABLE_SQL)?;
    conn.execute(SEED_SQL, [])
}

fn run_select(conn: &Connection, sql: &str) -> Result<Vec<Row>, DbError> {
    let mut stmt = conn.prepare(sql).map_err(engine_error)?;
    let mut rows = stmt.query([]).map_err(engine_error)?;

    // Column names are only known once the statement has executed.
    let columns: Vec<String> = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

    let mut result = Vec::new();
    while let Some(row) = rows.next().map_err(engine_error)? {
        let mut record = Row::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(engine_error)?;
            record.insert(name.clone(), to_json(value));
        }
        result.push(record);
    }

    debug!("Query returned {} rows", result.len());
    Ok(result)
}

fn read_prompt_record(row: &duckdb::Row<'_>) -> duckdb::Result<PromptRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_prompt(record: PromptRecord) -> Result<LegalPrompt, DbError> {
    let (id, name, prompt, category, created_at, system_message) = record;
    let created_at = legal_prompts::parse_timestamp(&created_at).ok_or_else(|| {
        DbError::new(
            SqlState::InvalidTextRepresentation,
            format!("Unreadable createdAt value: {}", created_at),
        )
    })?;

    Ok(LegalPrompt {
        id,
        name,
        prompt,
        category,
        created_at,
        system_message,
    })
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => i.into(),
        ValueRef::SmallInt(i) => i.into(),
        ValueRef::Int(i) => i.into(),
        ValueRef::BigInt(i) => i.into(),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueRef::UTinyInt(i) => i.into(),
        ValueRef::USmallInt(i) => i.into(),
        ValueRef::UInt(i) => i.into(),
        ValueRef::UBigInt(i) => i.into(),
        ValueRef::Float(f) => float(f64::from(f)),
        ValueRef::Double(f) => float(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(float).unwrap_or(Value::String(text))
        }
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
        ValueRef::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            chrono::DateTime::from_timestamp_micros(micros)
                .map(|ts| Value::String(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Null)
        }
        ValueRef::Date32(days) => chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .map(|date| Value::String(date.to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}
