use duckdb::{Config, Connection};
use r2d2::ManageConnection;
use std::sync::{Arc, Mutex};

/// Hands out clones of one base connection so every pooled connection sees
/// the same database, including `:memory:` ones.
pub struct DuckDBConnectionManager {
    base: Arc<Mutex<Connection>>,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: &str) -> Result<Self, duckdb::Error> {
        // Queries may only see the database itself, never local files or URLs.
        let config = Config::default().enable_external_access(false)?;
        let base = if connection_string == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(connection_string, config)?
        };

        Ok(Self {
            base: Arc::new(Mutex::new(base)),
        })
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let base = self.base.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        base.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
