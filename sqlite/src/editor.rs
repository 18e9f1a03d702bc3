//! Windowed table editing.
//!
//! [`TableEditor::load`] reads the first rows of a table together with its
//! column and key metadata. [`TableEditor::save`] writes edited rows back,
//! matching each row by its original primary key. A save runs in a single
//! transaction: either every row is updated or none is.
//!
//! # Example
//!
//! ```no_run
//! use localdb_config::Backend;
//! use localdb_sqlite::{DatabaseHandle, EditedRow, TableEditor};
//!
//! let mut handle = DatabaseHandle::open("app.db", Backend::Buffered).unwrap();
//! let editor = TableEditor::default();
//!
//! let window = editor.load(&handle, "users").unwrap();
//! let mut row = window.rows[0].clone();
//! row.push("email", "new@example.com");
//!
//! let edit = EditedRow::new(window.key_of(&window.rows[0]), row);
//! let report = editor.save(&mut handle, "users", &[edit]).unwrap();
//! assert_eq!(report.updated, 1);
//! ```

use localdb_config::DEFAULT_TABLE_WINDOW;
use localdb_core::{Row, TableWindow, Value};
use rusqlite::params_from_iter;
use tracing::{debug, info};

use crate::convert::to_sql;
use crate::error::{EditError, Result};
use crate::handle::DatabaseHandle;
use crate::inspect::quote_identifier;

/// One edited row and the key it was loaded with.
#[derive(Debug, Clone, PartialEq)]
pub struct EditedRow {
    /// Primary key values as loaded, in key order.
    pub key: Vec<Value>,
    /// Edited cells; key columns must be present and unchanged.
    pub row: Row,
}

impl EditedRow {
    /// Pairs an original key with the edited row.
    pub fn new(key: Vec<Value>, row: Row) -> Self {
        Self { key, row }
    }
}

/// Outcome of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Rows submitted.
    pub submitted: usize,
    /// Rows the database reported as changed.
    pub updated: usize,
}

/// Loads and saves bounded row windows.
#[derive(Debug, Clone)]
pub struct TableEditor {
    window: usize,
}

impl Default for TableEditor {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_WINDOW)
    }
}

impl TableEditor {
    /// Creates an editor loading at most `window` rows.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    /// Maximum rows loaded per table.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Loads the first rows of `table`.
    ///
    /// The column list comes from the catalog, so an empty table still
    /// reports its columns.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTable`](crate::SqliteError::UnknownTable) if the
    /// table does not exist.
    pub fn load(&self, handle: &DatabaseHandle, table: &str) -> Result<TableWindow> {
        let inspector = handle.inspector();
        let columns = inspector.list_columns(table)?;
        let key = inspector.primary_key(table)?;

        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_identifier(table));
        let result = handle.query(&sql, &[Value::Integer(self.window as i64)])?;
        debug!(table, rows = result.len(), "table window loaded");

        Ok(TableWindow {
            table: table.to_string(),
            columns,
            key_columns: key.into_iter().map(|c| c.name).collect(),
            rows: result.rows,
        })
    }

    /// Writes edited rows back and persists once.
    ///
    /// Each row becomes one `UPDATE` of its non-key cells, matched on the
    /// original key. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EditError::NoPrimaryKey`] if the table has no primary key.
    /// - [`EditError::MissingKey`] or [`EditError::KeyEdited`] if a row
    ///   lacks or changes a key cell.
    /// - [`UnknownColumn`](crate::SqliteError::UnknownColumn) for a cell
    ///   naming no column.
    /// - [`QueryError`](crate::SqliteError::QueryError) if an update fails;
    ///   the whole batch is rolled back.
    /// - [`PersistFailed`](crate::SqliteError::PersistFailed) if the
    ///   write-back fails after the batch committed.
    pub fn save(
        &self,
        handle: &mut DatabaseHandle,
        table: &str,
        rows: &[EditedRow],
    ) -> Result<SaveReport> {
        let statements = self.plan_updates(handle, table, rows)?;
        if statements.is_empty() {
            return Ok(SaveReport {
                submitted: rows.len(),
                updated: 0,
            });
        }

        let updated = handle.transaction(|tx| {
            let mut updated = 0;
            for (sql, params) in &statements {
                updated += tx.execute(sql, params_from_iter(params.iter().map(to_sql)))?;
            }
            Ok(updated)
        })?;
        handle.persist()?;

        info!(table, submitted = rows.len(), updated, "rows saved");
        Ok(SaveReport {
            submitted: rows.len(),
            updated,
        })
    }

    /// Validates the batch and builds one `UPDATE` per row that has
    /// non-key cells.
    fn plan_updates(
        &self,
        handle: &DatabaseHandle,
        table: &str,
        rows: &[EditedRow],
    ) -> Result<Vec<(String, Vec<Value>)>> {
        let inspector = handle.inspector();
        let key: Vec<String> = inspector
            .primary_key(table)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        if key.is_empty() {
            return Err(EditError::NoPrimaryKey(table.to_string()).into());
        }

        let mut statements = Vec::with_capacity(rows.len());
        for (index, edited) in rows.iter().enumerate() {
            for (position, column) in key.iter().enumerate() {
                let current = edited.row.get(column);
                let original = edited.key.get(position);
                match (current, original) {
                    (Some(current), Some(original)) if current.loosely_equals(original) => {}
                    (Some(_), Some(_)) => {
                        return Err(EditError::KeyEdited {
                            row: index,
                            column: column.clone(),
                        }
                        .into());
                    }
                    _ => {
                        return Err(EditError::MissingKey {
                            row: index,
                            column: column.clone(),
                        }
                        .into());
                    }
                }
            }
            inspector.require_columns(table, edited.row.columns())?;

            let assignments: Vec<(&str, &Value)> = edited
                .row
                .iter()
                .filter(|(name, _)| !key.iter().any(|k| k == name))
                .collect();
            if assignments.is_empty() {
                continue;
            }

            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (name, _))| format!("{} = ?{}", quote_identifier(name), i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let where_clause = key
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    format!("{} = ?{}", quote_identifier(name), assignments.len() + i + 1)
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            let sql = format!(
                "UPDATE {} SET {set_clause} WHERE {where_clause}",
                quote_identifier(table)
            );

            let mut params: Vec<Value> = assignments.iter().map(|(_, v)| (*v).clone()).collect();
            params.extend(edited.key.iter().take(key.len()).cloned());
            statements.push((sql, params));
        }
        Ok(statements)
    }

    /// Inserts one row with a value for every column, in column order.
    ///
    /// A `NULL` for an `INTEGER PRIMARY KEY` lets SQLite assign the rowid.
    /// Returns the rowid of the new row.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::ValueCountMismatch`] if `values` does not match
    /// the column count, [`QueryError`](crate::SqliteError::QueryError) if
    /// the insert fails, or
    /// [`PersistFailed`](crate::SqliteError::PersistFailed).
    pub fn add_row(
        &self,
        handle: &mut DatabaseHandle,
        table: &str,
        values: Vec<Value>,
    ) -> Result<i64> {
        let columns = handle.inspector().list_columns(table)?;
        if values.len() != columns.len() {
            return Err(EditError::ValueCountMismatch {
                expected: columns.len(),
                actual: values.len(),
            }
            .into());
        }

        let names = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders})",
            quote_identifier(table)
        );

        handle.run(&sql, &values)?;
        let rowid = handle.last_insert_rowid();
        handle.persist()?;
        info!(table, rowid, "row added");
        Ok(rowid)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use localdb_config::Backend;
    use rusqlite::Connection;

    use super::*;
    use crate::error::SqliteError;

    fn open(dir: &Path, setup: &str) -> DatabaseHandle {
        let path = dir.join("app.db");
        Connection::open(&path).unwrap().execute_batch(setup).unwrap();
        DatabaseHandle::open(&path, Backend::Buffered).unwrap()
    }

    fn users(dir: &Path) -> DatabaseHandle {
        open(
            dir,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
             INSERT INTO users VALUES (1, 'a', 30), (2, 'b', 40);",
        )
    }

    #[test]
    fn test_load_empty_table_keeps_columns() {
        let dir = tempfile::tempdir().unwrap();
        let handle = open(dir.path(), "CREATE TABLE e (x INTEGER PRIMARY KEY, y TEXT);");
        let window = TableEditor::default().load(&handle, "e").unwrap();
        assert!(window.rows.is_empty());
        assert_eq!(window.column_names(), vec!["x", "y"]);
        assert_eq!(window.key_columns, vec!["x"]);
    }

    #[test]
    fn test_load_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let handle = open(
            dir.path(),
            "CREATE TABLE n (v INTEGER PRIMARY KEY);
             WITH RECURSIVE s(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM s WHERE x < 150)
             INSERT INTO n SELECT x FROM s;",
        );
        let window = TableEditor::default().load(&handle, "n").unwrap();
        assert_eq!(window.rows.len(), 100);
        assert_eq!(TableEditor::new(7).load(&handle, "n").unwrap().rows.len(), 7);
    }

    #[test]
    fn test_save_updates_by_original_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let editor = TableEditor::default();

        let edits = vec![EditedRow::new(
            vec![Value::Integer(1)],
            Row::new().with("id", 1).with("name", "z").with("age", 31),
        )];
        let report = editor.save(&mut handle, "users", &edits).unwrap();
        assert_eq!(report, SaveReport { submitted: 1, updated: 1 });
        assert!(!handle.is_dirty());

        let on_disk: (String, i64) = Connection::open(handle.path())
            .unwrap()
            .query_row("SELECT name, age FROM users WHERE id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(on_disk, ("z".to_string(), 31));
    }

    #[test]
    fn test_key_sent_back_as_text_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let edits = vec![EditedRow::new(
            vec![Value::Integer(2)],
            Row::new().with("id", "2").with("name", "bb"),
        )];
        let report = TableEditor::default().save(&mut handle, "users", &edits).unwrap();
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_key_edit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let edits = vec![EditedRow::new(
            vec![Value::Integer(1)],
            Row::new().with("id", 5).with("name", "x"),
        )];
        let err = TableEditor::default().save(&mut handle, "users", &edits).unwrap_err();
        assert!(matches!(
            err,
            SqliteError::EditError(EditError::KeyEdited { row: 0, .. })
        ));
        assert!(!handle.is_dirty());
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let edits = vec![EditedRow::new(vec![Value::Integer(1)], Row::new().with("name", "x"))];
        let err = TableEditor::default().save(&mut handle, "users", &edits).unwrap_err();
        assert!(matches!(
            err,
            SqliteError::EditError(EditError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_table_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = open(dir.path(), "CREATE TABLE loose (a, b); INSERT INTO loose VALUES (1, 2);");
        let edits = vec![EditedRow::new(Vec::new(), Row::new().with("a", 1).with("b", 3))];
        let err = TableEditor::default().save(&mut handle, "loose", &edits).unwrap_err();
        assert!(matches!(err, SqliteError::EditError(EditError::NoPrimaryKey(_))));
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let edits = vec![EditedRow::new(
            vec![Value::Integer(1)],
            Row::new().with("id", 1).with("nickname", "x"),
        )];
        let err = TableEditor::default().save(&mut handle, "users", &edits).unwrap_err();
        assert!(matches!(err, SqliteError::UnknownColumn { .. }));
    }

    #[test]
    fn test_failing_row_rolls_back_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = open(
            dir.path(),
            "CREATE TABLE u (id INTEGER PRIMARY KEY, email TEXT UNIQUE);
             INSERT INTO u VALUES (1, 'a@x'), (2, 'b@x');",
        );
        let edits = vec![
            EditedRow::new(vec![Value::Integer(1)], Row::new().with("id", 1).with("email", "c@x")),
            EditedRow::new(vec![Value::Integer(2)], Row::new().with("id", 2).with("email", "c@x")),
        ];
        let err = TableEditor::default().save(&mut handle, "u", &edits).unwrap_err();
        assert!(matches!(err, SqliteError::QueryError(_)));

        let email = handle
            .query("SELECT email FROM u WHERE id = 1", &[])
            .unwrap()
            .rows[0]
            .get("email")
            .cloned();
        assert_eq!(email, Some(Value::from("a@x")));
        assert!(!handle.is_dirty());
    }

    #[test]
    fn test_composite_key_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = open(
            dir.path(),
            "CREATE TABLE pair (a TEXT, b INTEGER, note TEXT, PRIMARY KEY (a, b));
             INSERT INTO pair VALUES ('x', 1, 'old'), ('x', 2, 'keep');",
        );
        let editor = TableEditor::default();
        let window = editor.load(&handle, "pair").unwrap();
        assert_eq!(window.key_columns, vec!["a", "b"]);

        let mut row = window.rows[0].clone();
        row.push("note", "new");
        let edits = vec![EditedRow::new(window.key_of(&window.rows[0]), row)];
        let report = editor.save(&mut handle, "pair", &edits).unwrap();
        assert_eq!(report.updated, 1);

        let notes = handle.query("SELECT note FROM pair ORDER BY b", &[]).unwrap();
        assert_eq!(notes.rows[0].get("note"), Some(&Value::from("new")));
        assert_eq!(notes.rows[1].get("note"), Some(&Value::from("keep")));
    }

    #[test]
    fn test_add_row_assigns_rowid() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = users(dir.path());
        let editor = TableEditor::default();

        let rowid = editor
            .add_row(&mut handle, "users", vec![Value::Null, Value::from("c"), Value::Null])
            .unwrap();
        assert_eq!(rowid, 3);
        assert!(!handle.is_dirty());

        let err = editor
            .add_row(&mut handle, "users", vec![Value::from("only one")])
            .unwrap_err();
        assert!(matches!(
            err,
            SqliteError::EditError(EditError::ValueCountMismatch { expected: 3, actual: 1 })
        ));
    }
}
