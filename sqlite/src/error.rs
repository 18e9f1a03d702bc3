//! Error types for database session operations.
//!
//! Every variant renders as a human-readable message; the command boundary
//! shows that message to the user and keeps the session in its prior state.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening, querying, editing, or persisting a
/// database.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The file is missing, unreadable, or not a SQLite database.
    #[error("failed to open database '{}': {reason}", path.display())]
    OpenError {
        /// Requested database path.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Statement failure; carries the engine message verbatim.
    #[error("{0}")]
    QueryError(String),

    /// Table name not present in the catalog.
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// Column name not present in the table.
    #[error("no such column: {table}.{column}")]
    UnknownColumn {
        /// Table that was searched.
        table: String,
        /// Missing column.
        column: String,
    },

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Writing the database back to disk failed after a mutation.
    #[error(
        "failed to save database '{}': {source}; the change is applied in memory but not on disk",
        path.display()
    )]
    PersistFailed {
        /// Origin file that could not be written.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// An operation needed an open database.
    #[error("no database is currently open; open a database first")]
    NotOpen,

    /// Rejected table edit.
    #[error(transparent)]
    EditError(#[from] EditError),

    /// Settings or autodetection failure.
    #[error("config error: {0}")]
    ConfigError(#[from] localdb_config::ConfigError),
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        SqliteError::QueryError(err.to_string())
    }
}

/// Reasons a table edit is refused before any statement runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The table has no primary key to match rows by.
    #[error("table '{0}' has no primary key; rows cannot be matched for update")]
    NoPrimaryKey(String),

    /// A primary key cell was changed.
    #[error("row {row}: primary key column '{column}' cannot be edited")]
    KeyEdited {
        /// Zero-based row index.
        row: usize,
        /// Key column that changed.
        column: String,
    },

    /// An edited row lacks a primary key column.
    #[error("row {row}: missing primary key column '{column}'")]
    MissingKey {
        /// Zero-based row index.
        row: usize,
        /// Absent key column.
        column: String,
    },

    /// The submitted rows do not line up with the loaded window.
    #[error("expected {expected} rows, got {actual}")]
    RowCountMismatch {
        /// Rows in the loaded window.
        expected: usize,
        /// Rows submitted.
        actual: usize,
    },

    /// An insert supplied the wrong number of values.
    #[error("expected {expected} values, got {actual}")]
    ValueCountMismatch {
        /// Columns in the table.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
