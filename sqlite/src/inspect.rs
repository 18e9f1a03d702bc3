//! Catalog queries: tables, columns, and primary keys.
//!
//! [`SchemaInspector`] borrows a connection and reads `sqlite_master` and
//! `pragma_table_info`. Nothing is cached; every call reflects the catalog
//! as it is right now, so two calls with no mutation in between return the
//! same answer.
//!
//! # Example
//!
//! ```no_run
//! use localdb_config::Backend;
//! use localdb_sqlite::DatabaseHandle;
//!
//! let handle = DatabaseHandle::open("app.db", Backend::Buffered).unwrap();
//! let inspector = handle.inspector();
//! for table in inspector.list_tables().unwrap() {
//!     let columns = inspector.list_columns(&table.name).unwrap();
//!     println!("{} ({} columns)", table.name, columns.len());
//! }
//! ```

use localdb_core::{ColumnDescriptor, SchemaSource, TableDescriptor};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SqliteError};

/// Quotes a name for use as an SQL identifier.
///
/// Embedded double quotes are doubled, so any table or column name can be
/// spliced into a statement safely.
///
/// # Examples
///
/// ```
/// use localdb_sqlite::quote_identifier;
///
/// assert_eq!(quote_identifier("users"), r#""users""#);
/// assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read-only view over the catalog of one connection.
#[derive(Debug, Clone, Copy)]
pub struct SchemaInspector<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaInspector<'a> {
    /// Wraps a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Lists the user tables in catalog order.
    ///
    /// Internal `sqlite_*` tables are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] if the catalog cannot be read.
    pub fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|name| name.map(TableDescriptor::new))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    /// Returns `true` if `table` is a user table.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] if the catalog cannot be read.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fails with [`SqliteError::UnknownTable`] if `table` does not exist.
    ///
    /// # Errors
    ///
    /// See above; catalog read failures surface as
    /// [`SqliteError::QueryError`].
    pub fn require_table(&self, table: &str) -> Result<()> {
        if self.table_exists(table)? {
            Ok(())
        } else {
            Err(SqliteError::UnknownTable(table.to_string()))
        }
    }

    /// Lists the columns of `table` in declaration order.
    ///
    /// Ordinals are dense and start at zero.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::UnknownTable`] if the table does not exist.
    pub fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let mut columns = stmt
            .query_map([table], |row| {
                Ok(ColumnDescriptor {
                    ordinal: row.get::<_, i64>(0)? as usize,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    key_position: row.get::<_, i64>(5)? as u32,
                    rowid_alias: false,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            self.require_table(table)?;
        }
        ColumnDescriptor::mark_rowid_alias(&mut columns);
        Ok(columns)
    }

    /// Returns the primary key columns of `table`, in key order.
    ///
    /// Empty when the table has no declared primary key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::UnknownTable`] if the table does not exist.
    pub fn primary_key(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut key: Vec<ColumnDescriptor> = self
            .list_columns(table)?
            .into_iter()
            .filter(ColumnDescriptor::is_primary_key)
            .collect();
        key.sort_by_key(|c| c.key_position);
        Ok(key)
    }

    /// Checks that every name in `columns` belongs to `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::UnknownColumn`] for the first unknown name,
    /// or [`SqliteError::UnknownTable`].
    pub fn require_columns<'c>(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = &'c str>,
    ) -> Result<()> {
        let known = self.list_columns(table)?;
        for column in columns {
            if !known.iter().any(|c| c.name == column) {
                return Err(SqliteError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl SchemaSource for SchemaInspector<'_> {
    type Error = SqliteError;

    fn tables(&self) -> Result<Vec<TableDescriptor>> {
        self.list_tables()
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.list_columns(table)
    }
}
