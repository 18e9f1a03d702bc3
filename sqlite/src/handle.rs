//! The open database and its write-back contract.
//!
//! A [`DatabaseHandle`] owns one SQLite connection plus the origin path it
//! was opened from. Two backends exist:
//!
//! - [`Backend::Native`] opens the origin file directly; committed writes
//!   are durable at once and [`persist`](DatabaseHandle::persist) has
//!   nothing to do.
//! - [`Backend::Buffered`] reads the origin file into a private working
//!   image. Mutations stay in that image until `persist` writes a full
//!   snapshot back over the origin file.
//!
//! Every mutation marks the handle dirty; `persist` clears the flag only
//! when the write-back succeeded.
//!
//! # Example
//!
//! ```no_run
//! use localdb_config::Backend;
//! use localdb_core::Value;
//! use localdb_sqlite::DatabaseHandle;
//!
//! let mut handle = DatabaseHandle::open("app.db", Backend::Buffered).unwrap();
//! handle
//!     .run("INSERT INTO notes (body) VALUES (?1)", &[Value::from("hello")])
//!     .unwrap();
//! assert!(handle.is_dirty());
//! handle.persist().unwrap();
//! ```

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use localdb_config::Backend;
use localdb_core::{ResultSet, Value};
use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection, OpenFlags, Transaction, params_from_iter};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use crate::convert::{collect_rows, column_names, to_sql};
use crate::error::{Result, SqliteError};
use crate::inspect::SchemaInspector;

/// Magic string at the start of every SQLite database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// One opened SQLite database.
///
/// Field order matters: the connection is dropped before the working image
/// it points at is deleted.
#[derive(Debug)]
pub struct DatabaseHandle {
    conn: Connection,
    path: PathBuf,
    backend: Backend,
    dirty: bool,
    image: Option<TempPath>,
}

fn open_error(path: &Path, reason: impl ToString) -> SqliteError {
    SqliteError::OpenError {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Rejects files that are non-empty but do not carry the SQLite header.
///
/// An empty file is a valid, empty database.
fn check_header(path: &Path, head: &[u8]) -> Result<()> {
    if head.is_empty() || head.starts_with(SQLITE_HEADER) {
        Ok(())
    } else {
        Err(open_error(path, "file is not a database"))
    }
}

/// Forces SQLite to read the catalog so a corrupt file fails at open time.
fn probe(conn: &Connection, path: &Path) -> Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| open_error(path, e))?;
    Ok(())
}

impl DatabaseHandle {
    /// Opens `path` with the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::OpenError`] if the file is missing,
    /// unreadable, or not a valid database image.
    pub fn open(path: impl AsRef<Path>, backend: Backend) -> Result<Self> {
        let path = path.as_ref();
        let handle = match backend {
            Backend::Native => Self::open_native(path)?,
            Backend::Buffered => Self::open_buffered(path)?,
        };
        info!(path = %path.display(), ?backend, "database opened");
        Ok(handle)
    }

    fn open_native(path: &Path) -> Result<Self> {
        let mut head = Vec::with_capacity(SQLITE_HEADER.len());
        fs::File::open(path)
            .and_then(|f| f.take(SQLITE_HEADER.len() as u64).read_to_end(&mut head))
            .map_err(|e| open_error(path, e))?;
        check_header(path, &head)?;

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| open_error(path, e))?;
        probe(&conn, path)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            backend: Backend::Native,
            dirty: false,
            image: None,
        })
    }

    fn open_buffered(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| open_error(path, e))?;
        check_header(path, &bytes)?;

        let mut file = tempfile::Builder::new()
            .prefix("localdb-")
            .suffix(".db")
            .tempfile()
            .map_err(|e| open_error(path, e))?;
        file.write_all(&bytes).map_err(|e| open_error(path, e))?;
        file.flush().map_err(|e| open_error(path, e))?;
        let image = file.into_temp_path();
        debug!(image = %image.display(), bytes = bytes.len(), "working image created");

        let conn = Connection::open(&image).map_err(|e| open_error(path, e))?;
        probe(&conn, path)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            backend: Backend::Buffered,
            dirty: false,
            image: Some(image),
        })
    }

    /// Origin file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backend in use.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Returns `true` if mutations happened since the last successful
    /// [`persist`](Self::persist).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` while an explicit transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Rowid of the most recent successful insert.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Catalog access for this database.
    pub fn inspector(&self) -> SchemaInspector<'_> {
        SchemaInspector::new(&self.conn)
    }

    /// Runs every statement of `sql` and returns the first tabular result.
    ///
    /// See [`execute_limited`](Self::execute_limited).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] with the engine message.
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        self.execute_limited(sql, None)
    }

    /// Runs every statement of `sql` in order.
    ///
    /// The first statement that yields columns supplies the result; its
    /// column list is kept even when it returns no rows. At most `limit`
    /// rows are kept. Later row-producing statements are stepped to
    /// completion and discarded. A script without any such statement
    /// returns an empty result with no columns.
    ///
    /// Statements before a failing one stay applied.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] with the engine message.
    pub fn execute_limited(&mut self, sql: &str, limit: Option<usize>) -> Result<ResultSet> {
        let mut captured: Option<ResultSet> = None;
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next()? {
            if !stmt.readonly() {
                self.dirty = true;
            }
            if stmt.column_count() == 0 {
                stmt.execute([])?;
                continue;
            }
            let columns = column_names(&stmt);
            let mut rows = stmt.query([])?;
            if captured.is_none() {
                captured = Some(collect_rows(&mut rows, columns, limit)?);
            } else {
                while rows.next()?.is_some() {}
            }
        }
        Ok(captured.unwrap_or_default())
    }

    /// Runs one statement with positional parameters and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] with the engine message.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = column_names(&stmt);
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;
        Ok(collect_rows(&mut rows, columns, None)?)
    }

    /// Runs one mutating statement with positional parameters.
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::QueryError`] with the engine message.
    pub fn run(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        let changed = self
            .conn
            .execute(sql, params_from_iter(params.iter().map(to_sql)))?;
        self.dirty = true;
        Ok(changed)
    }

    /// Runs `f` inside one transaction.
    ///
    /// The transaction commits when `f` succeeds and rolls back when it
    /// fails, leaving the database unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or [`SqliteError::QueryError`] if the
    /// transaction cannot begin or commit.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        self.dirty = true;
        Ok(value)
    }

    /// Serializes the whole database into a consistent byte image.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::IoError`] if the scratch file cannot be
    /// created or read, or [`SqliteError::QueryError`] if the snapshot
    /// fails (for example inside an open transaction).
    pub fn export_bytes(&self) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let target = scratch.path().join("export.db");
        self.conn
            .execute("VACUUM INTO ?1", [target.to_string_lossy().into_owned()])?;
        Ok(fs::read(&target)?)
    }

    /// Writes the current state back to the origin file.
    ///
    /// For the buffered backend the snapshot is written to a sibling file
    /// and renamed over the origin, so a failed write never leaves a
    /// half-written database behind. For the native backend this only
    /// clears the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::PersistFailed`] if the snapshot or the write
    /// fails; the in-memory state keeps the mutation and stays dirty.
    pub fn persist(&mut self) -> Result<()> {
        if !self.backend.needs_persist() {
            self.dirty = false;
            return Ok(());
        }
        if self.in_transaction() {
            return Err(self.persist_failed(io::Error::other(
                "a transaction is still open; COMMIT or ROLLBACK first",
            )));
        }
        let bytes = self
            .export_bytes()
            .map_err(|e| self.persist_failed(io::Error::other(e.to_string())))?;
        self.write_back(&bytes)
            .map_err(|e| self.persist_failed(e))?;
        self.dirty = false;
        info!(path = %self.path.display(), bytes = bytes.len(), "database persisted");
        Ok(())
    }

    /// Settles the handle before it is dropped or replaced.
    ///
    /// Refuses while a transaction is open on either backend, since dropping
    /// the connection would roll it back. Otherwise persists when dirty.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::PersistFailed`]; the handle is left as it was.
    pub fn flush(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(self.persist_failed(io::Error::other(
                "a transaction is still open; COMMIT or ROLLBACK first",
            )));
        }
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn persist_failed(&self, source: io::Error) -> SqliteError {
        warn!(path = %self.path.display(), error = %source, "persist failed");
        SqliteError::PersistFailed {
            path: self.path.clone(),
            source,
        }
    }

    fn write_back(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        if let Ok(meta) = fs::metadata(&self.path) {
            staged.as_file().set_permissions(meta.permissions())?;
        }
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
