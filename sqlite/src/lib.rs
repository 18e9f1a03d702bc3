//! SQLite session layer for the local database browser.
//!
//! This crate opens a database file, reads its catalog, runs console
//! queries, and edits table rows, writing every change back to the file it
//! came from.
//!
//! # Architecture
//!
//! - **`handle`** — [`DatabaseHandle`]: one connection, a native or
//!   buffered backend, and the persist contract
//! - **`inspect`** — [`SchemaInspector`]: tables, columns, primary keys
//! - **`console`** — [`QueryConsole`]: free-form SQL with a row cap
//! - **`editor`** — [`TableEditor`]: windowed loads and key-matched saves
//! - **`session`** — [`Session`]: the one open database plus tree state
//! - **`panel`** — [`PanelRouter`]: turns surface requests into replies
//!
//! # Quick start
//!
//! ```no_run
//! use localdb_config::Settings;
//! use localdb_core::Request;
//! use localdb_sqlite::{PanelRouter, Session};
//!
//! let mut session = Session::new(Settings::default());
//! session.open("app.db").unwrap();
//!
//! let mut router = PanelRouter::new();
//! let replies = router.dispatch(
//!     &mut session,
//!     Request::ExecuteQuery { query: "SELECT * FROM users".into() },
//! );
//! println!("{}", serde_json::to_string(&replies).unwrap());
//! ```
//!
//! # Backends
//!
//! The buffered backend (the default) works on a private image of the
//! file; a mutation reaches disk only after [`DatabaseHandle::persist`].
//! The console and editor persist right after each successful mutation,
//! so callers rarely need to call it themselves.

mod console;
mod convert;
mod editor;
mod error;
mod handle;
mod inspect;
mod panel;
mod session;

pub use console::{QueryConsole, QueryOutcome};
pub use editor::{EditedRow, SaveReport, TableEditor};
pub use error::{EditError, Result, SqliteError};
pub use handle::{DatabaseHandle, SQLITE_HEADER};
pub use inspect::{SchemaInspector, quote_identifier};
pub use panel::{ConsolePanel, PanelRouter, TablePanel};
pub use session::Session;
