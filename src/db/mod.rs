pub mod db_pool;
pub mod duckdb_store;
pub mod legal_prompts;
pub mod sql_state;
pub mod store;

pub use duckdb_store::DuckDbStore;
pub use store::{DbError, FetchOutcome, QueryStore, Row};
