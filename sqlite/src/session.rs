//! The single browsing session.
//!
//! A [`Session`] owns at most one open [`DatabaseHandle`] plus the tree
//! presenter, console, and editor that operate on it. Every operation that
//! needs a database fails with [`SqliteError::NotOpen`] while none is open.
//! Opening another database replaces the current one; a failed open keeps
//! the previous database untouched.
//!
//! # Example
//!
//! ```no_run
//! use localdb_config::Settings;
//! use localdb_sqlite::Session;
//!
//! let mut session = Session::new(Settings::default());
//! session.open_configured(".").unwrap();
//!
//! let outcome = session.run_query("SELECT name FROM sqlite_master").unwrap();
//! println!("{} rows", outcome.result.len());
//!
//! for (table, columns) in session.expand_tree().unwrap() {
//!     println!("{} ({} columns)", table.label, columns.len());
//! }
//! ```

use std::path::{Path, PathBuf};

use localdb_config::{Backend, DatabaseLocator, Settings};
use localdb_core::{ColumnDescriptor, TableDescriptor, TableWindow, TreeNode, TreePresenter, Value};
use tracing::info;

use crate::console::{QueryConsole, QueryOutcome};
use crate::editor::{EditedRow, SaveReport, TableEditor};
use crate::error::{Result, SqliteError};
use crate::handle::DatabaseHandle;

/// Open database, tree, console and editor bundled together.
#[derive(Debug)]
pub struct Session {
    handle: Option<DatabaseHandle>,
    tree: TreePresenter,
    settings: Settings,
    console: QueryConsole,
    editor: TableEditor,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Session {
    /// Creates a session with nothing open.
    pub fn new(settings: Settings) -> Self {
        Self {
            handle: None,
            tree: TreePresenter::new(),
            console: QueryConsole::new(settings.query_row_limit),
            editor: TableEditor::new(settings.table_window),
            settings,
        }
    }

    /// Settings the session was created with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns `true` while a database is open.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Path of the open database.
    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(DatabaseHandle::path)
    }

    /// The open database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when nothing is open.
    pub fn handle(&self) -> Result<&DatabaseHandle> {
        self.handle.as_ref().ok_or(SqliteError::NotOpen)
    }

    /// The open database, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when nothing is open.
    pub fn handle_mut(&mut self) -> Result<&mut DatabaseHandle> {
        self.handle.as_mut().ok_or(SqliteError::NotOpen)
    }

    /// Tree presenter; subscribe here for refresh signals.
    pub fn tree(&self) -> &TreePresenter {
        &self.tree
    }

    /// Tree presenter, mutably.
    pub fn tree_mut(&mut self) -> &mut TreePresenter {
        &mut self.tree
    }

    /// Opens `path` with the configured backend.
    ///
    /// # Errors
    ///
    /// See [`open_with`](Self::open_with).
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let backend = self.settings.backend;
        self.open_with(path, backend)
    }

    /// Opens `path` with an explicit backend, replacing any open database.
    ///
    /// Unsaved changes of the replaced database are persisted first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::PersistFailed`] when the open database cannot
    /// be settled, or [`SqliteError::OpenError`]. The previous database
    /// stays open in both cases.
    pub fn open_with(&mut self, path: impl AsRef<Path>, backend: Backend) -> Result<()> {
        if let Some(current) = self.handle.as_mut() {
            current.flush()?;
        }
        let handle = DatabaseHandle::open(path, backend)?;
        if let Some(previous) = self.handle.replace(handle) {
            info!(path = %previous.path().display(), "database closed");
        }
        self.tree.mark_loaded();
        Ok(())
    }

    /// Opens the project database found by autodetection or settings.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ConfigError`] if no candidate exists, or
    /// [`SqliteError::OpenError`].
    pub fn open_configured(&mut self, project_root: impl AsRef<Path>) -> Result<PathBuf> {
        let located = DatabaseLocator::for_project(project_root, &self.settings).resolve()?;
        info!(path = %located.path.display(), source = ?located.source, "opening project database");
        self.open(&located.path)?;
        Ok(located.path)
    }

    /// Re-reads the open database from disk.
    ///
    /// Used when an external process rewrote the file. A dirty buffered
    /// database is persisted first; if that fails, or a transaction is
    /// still open, the in-memory state is kept and the reload is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`], [`SqliteError::PersistFailed`], or
    /// [`SqliteError::OpenError`].
    pub fn reload(&mut self) -> Result<()> {
        let current = self.handle_mut()?;
        current.flush()?;
        let fresh = DatabaseHandle::open(current.path(), current.backend())?;
        self.handle = Some(fresh);
        self.tree.refresh();
        Ok(())
    }

    /// Closes the open database, persisting unsaved changes.
    ///
    /// Closing with nothing open is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::PersistFailed`]; the database stays open so
    /// the changes are not lost.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        handle.flush()?;
        if let Some(handle) = self.handle.take() {
            info!(path = %handle.path().display(), "database closed");
        }
        self.tree.mark_unloaded();
        Ok(())
    }

    /// Fires the tree refresh signal.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when nothing is open.
    pub fn refresh_tree(&mut self) -> Result<u64> {
        self.handle()?;
        Ok(self.tree.refresh())
    }

    /// Returns the tree children of `parent`, or the table nodes.
    ///
    /// An unloaded tree has no children.
    ///
    /// # Errors
    ///
    /// Propagates catalog errors.
    pub fn tree_children(&self, parent: Option<&TreeNode>) -> Result<Vec<TreeNode>> {
        match &self.handle {
            Some(handle) => self.tree.children(&handle.inspector(), parent),
            None => Ok(Vec::new()),
        }
    }

    /// Expands every table node.
    ///
    /// # Errors
    ///
    /// Propagates catalog errors.
    pub fn expand_tree(&self) -> Result<Vec<(TreeNode, Vec<TreeNode>)>> {
        match &self.handle {
            Some(handle) => self.tree.expand_all(&handle.inspector()),
            None => Ok(Vec::new()),
        }
    }

    /// Lists the user tables.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] or a catalog error.
    pub fn tables(&self) -> Result<Vec<TableDescriptor>> {
        self.handle()?.inspector().list_tables()
    }

    /// Lists the columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] or [`SqliteError::UnknownTable`].
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.handle()?.inspector().list_columns(table)
    }

    /// Runs console input; refreshes the tree when it mutated anything.
    ///
    /// # Errors
    ///
    /// See [`QueryConsole::run`].
    pub fn run_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        let handle = self.handle.as_mut().ok_or(SqliteError::NotOpen)?;
        let outcome = self.console.run(handle, sql)?;
        if outcome.mutated {
            self.tree.refresh();
        }
        Ok(outcome)
    }

    /// Loads the editing window of `table`.
    ///
    /// # Errors
    ///
    /// See [`TableEditor::load`].
    pub fn load_table(&self, table: &str) -> Result<TableWindow> {
        self.editor.load(self.handle()?, table)
    }

    /// Saves edited rows of `table`.
    ///
    /// # Errors
    ///
    /// See [`TableEditor::save`].
    pub fn save_table(&mut self, table: &str, rows: &[EditedRow]) -> Result<SaveReport> {
        let handle = self.handle.as_mut().ok_or(SqliteError::NotOpen)?;
        let report = self.editor.save(handle, table, rows)?;
        self.tree.refresh();
        Ok(report)
    }

    /// Inserts one row into `table`; returns its rowid.
    ///
    /// # Errors
    ///
    /// See [`TableEditor::add_row`].
    pub fn add_row(&mut self, table: &str, values: Vec<Value>) -> Result<i64> {
        let handle = self.handle.as_mut().ok_or(SqliteError::NotOpen)?;
        let rowid = self.editor.add_row(handle, table, values)?;
        self.tree.refresh();
        Ok(rowid)
    }
}
