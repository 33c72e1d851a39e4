//! Shared DuckDB plumbing.
//!
//! DuckDB allows one write connection per file, so every adapter shares a
//! single `Arc<Mutex<Connection>>`; holding the lock across a statement
//! batch is what makes multi-statement operations (queue take, cascade
//! deletes) atomic from the rest of the process's point of view.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::DomainError;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Open (or create) the database file and initialize every adapter's schema.
pub fn open_database(db_path: &Path) -> Result<SharedConnection, DomainError> {
    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
    initialize_all(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database for tests.
pub fn open_in_memory() -> Result<SharedConnection, DomainError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e)))?;
    initialize_all(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn initialize_all(conn: &Connection) -> Result<(), DomainError> {
    super::DuckdbRepositoryStore::initialize_schema(conn)?;
    super::DuckdbSnippetStore::initialize_schema(conn)?;
    super::DuckdbTaskQueue::initialize_schema(conn)?;
    super::DuckdbStatusStore::initialize_schema(conn)?;
    super::DuckdbKeywordIndex::initialize_schema(conn)?;
    super::DuckdbVectorIndex::initialize_schema(conn)?;
    debug!("DuckDB schema initialized");
    Ok(())
}

/// Timestamps are stored as RFC 3339 UTC text; one fixed format keeps
/// lexicographic and chronological order identical.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Quote a string list for an `IN (...)` clause.
pub(crate) fn quoted_in_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a value for use inside a `LIKE '%...%'` pattern.
pub(crate) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "''")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_round_trip() {
        let now = Utc::now();
        let decoded = decode_ts(&encode_ts(now));
        assert_eq!(decoded.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_quoted_in_list_escapes() {
        let quoted = quoted_in_list(&["a'b".to_string(), "c".to_string()]);
        assert_eq!(quoted, "'a''b','c'");
    }

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let conn = open_in_memory().expect("schema should initialize");
        drop(conn);
    }
}
