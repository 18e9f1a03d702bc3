//! Free-form SQL console.
//!
//! Runs arbitrary SQL text against the open database and hands back the
//! first tabular result. When the text mutated anything and no explicit
//! transaction is left open, the database is persisted right away.

use localdb_config::DEFAULT_QUERY_ROW_LIMIT;
use localdb_core::ResultSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::handle::DatabaseHandle;

/// Result of one console run.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// First tabular result, or an empty result without columns.
    pub result: ResultSet,
    /// `true` if any statement may have changed the database.
    pub mutated: bool,
}

/// Executes console input with a row cap.
#[derive(Debug, Clone)]
pub struct QueryConsole {
    row_limit: usize,
}

impl Default for QueryConsole {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_ROW_LIMIT)
    }
}

impl QueryConsole {
    /// Creates a console returning at most `row_limit` rows per query.
    pub fn new(row_limit: usize) -> Self {
        Self {
            row_limit: row_limit.max(1),
        }
    }

    /// Maximum rows returned per query.
    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Runs `sql` and persists any resulting mutation.
    ///
    /// Statements before a failing one stay applied and are persisted
    /// before the query error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`](crate::SqliteError::QueryError) with the
    /// engine message, or [`PersistFailed`](crate::SqliteError::PersistFailed)
    /// when the statements succeeded but the write-back did not.
    pub fn run(&self, handle: &mut DatabaseHandle, sql: &str) -> Result<QueryOutcome> {
        debug!(sql, limit = self.row_limit, "console query");
        let executed = handle.execute_limited(sql, Some(self.row_limit));
        let mutated = handle.is_dirty();

        if mutated && !handle.in_transaction() {
            match (&executed, handle.persist()) {
                (_, Ok(())) => {}
                (Ok(_), Err(e)) => return Err(e),
                (Err(_), Err(e)) => warn!(error = %e, "persist after failed query"),
            }
        }

        let result = executed?;
        if result.truncated {
            debug!(limit = self.row_limit, "console result truncated");
        }
        Ok(QueryOutcome { result, mutated })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use localdb_config::Backend;
    use localdb_core::Value;
    use rusqlite::Connection;

    use super::*;
    use crate::error::SqliteError;

    fn fixture(dir: &Path) -> DatabaseHandle {
        let path = dir.join("app.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        DatabaseHandle::open(&path, Backend::Buffered).unwrap()
    }

    fn count_on_disk(path: &Path) -> i64 {
        Connection::open(path)
            .unwrap()
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_insert_then_select() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = fixture(dir.path());
        let console = QueryConsole::default();

        let outcome = console
            .run(&mut handle, "INSERT INTO t (name) VALUES ('x')")
            .unwrap();
        assert!(outcome.mutated);
        assert!(outcome.result.columns.is_empty());
        assert!(!handle.is_dirty());
        assert_eq!(count_on_disk(handle.path()), 1);

        let outcome = console.run(&mut handle, "SELECT * FROM t").unwrap();
        assert!(!outcome.mutated);
        assert_eq!(outcome.result.rows[0].get("name"), Some(&Value::from("x")));
    }

    #[test]
    fn test_row_cap_marks_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = fixture(dir.path());
        let console = QueryConsole::new(2);
        console
            .run(&mut handle, "INSERT INTO t (name) VALUES ('a'), ('b'), ('c')")
            .unwrap();

        let outcome = console.run(&mut handle, "SELECT * FROM t").unwrap();
        assert_eq!(outcome.result.len(), 2);
        assert!(outcome.result.truncated);
    }

    #[test]
    fn test_failed_script_keeps_earlier_statements() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = fixture(dir.path());
        let console = QueryConsole::default();

        let err = console
            .run(&mut handle, "INSERT INTO t (name) VALUES ('kept'); SELECT * FROM nope")
            .unwrap_err();
        assert!(matches!(err, SqliteError::QueryError(_)));
        assert!(!handle.is_dirty());
        assert_eq!(count_on_disk(handle.path()), 1);
    }

    #[test]
    fn test_open_transaction_defers_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = fixture(dir.path());
        let console = QueryConsole::default();

        console
            .run(&mut handle, "BEGIN; INSERT INTO t (name) VALUES ('x');")
            .unwrap();
        assert!(handle.is_dirty());
        assert_eq!(count_on_disk(handle.path()), 0);

        console.run(&mut handle, "COMMIT").unwrap();
        assert!(!handle.is_dirty());
        assert_eq!(count_on_disk(handle.path()), 1);
    }
}
