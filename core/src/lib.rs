//! Core types for browsing and editing a local SQLite database.
//!
//! This crate holds everything that does not touch the database engine:
//!
//! - [`Value`], [`Row`], [`ResultSet`] — dynamically typed cells, ordered
//!   rows, and results that keep their column list even when empty.
//! - [`TableDescriptor`], [`ColumnDescriptor`], [`TableWindow`] — catalog
//!   metadata and an editable row window.
//! - [`TreePresenter`] — the lazily expanded table/column tree, driven by
//!   any [`SchemaSource`].
//! - [`Request`], [`Response`] — the JSON envelopes exchanged with a
//!   surface.
//! - [`ChangeNotifier`] — a polling watcher for an external seed file.
//!
//! # Example
//!
//! ```
//! use localdb_core::{Request, Response, Row, Value};
//!
//! let req: Request = serde_json::from_str(
//!     r#"{"command":"saveData","data":[{"id":1,"name":"b"}]}"#,
//! ).unwrap();
//! assert!(matches!(req, Request::SaveData { .. }));
//!
//! let row = Row::new().with("id", 1).with("name", "b");
//! assert_eq!(row.get("id"), Some(&Value::Integer(1)));
//!
//! let reply = Response::info("Data saved successfully.");
//! assert!(serde_json::to_string(&reply).unwrap().contains("notice"));
//! ```

mod protocol;
mod tree;
mod types;
mod watch;

pub use protocol::{NoticeLevel, Request, Response};
pub use tree::{
    CommandBinding, NodeKind, SchemaSource, TreeNode, TreePresenter, TreeState,
    VIEW_TABLE_COMMAND,
};
pub use types::{
    BLOB_KEY, ColumnDescriptor, ResultSet, Row, TableDescriptor, TableWindow, Value, ValueError,
};
pub use watch::{ChangeNotifier, DEFAULT_POLL_INTERVAL, WatchHandle};
