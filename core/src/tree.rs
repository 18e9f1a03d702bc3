//! Two-level table/column tree with a manual refresh signal.
//!
//! The tree is pull-based: a consumer asks for the root children (one node
//! per table), then for the children of a table node (one leaf per column).
//! Nothing is cached between requests; every expansion goes back to the
//! [`SchemaSource`]. [`TreePresenter::refresh`] only tells subscribers to
//! re-pull from the root.
//!
//! # Example
//!
//! ```
//! use localdb_core::{ColumnDescriptor, SchemaSource, TableDescriptor, TreePresenter};
//!
//! struct Fixed;
//!
//! impl SchemaSource for Fixed {
//!     type Error = std::convert::Infallible;
//!
//!     fn tables(&self) -> Result<Vec<TableDescriptor>, Self::Error> {
//!         Ok(vec![TableDescriptor::new("users")])
//!     }
//!
//!     fn columns(&self, _table: &str) -> Result<Vec<ColumnDescriptor>, Self::Error> {
//!         Ok(vec![ColumnDescriptor::new(0, "id", "INTEGER").primary_key(1)])
//!     }
//! }
//!
//! let mut tree = TreePresenter::new();
//! tree.mark_loaded();
//!
//! let roots = tree.children(&Fixed, None).unwrap();
//! assert_eq!(roots[0].label, "users");
//!
//! let leaves = tree.children(&Fixed, Some(&roots[0])).unwrap();
//! assert_eq!(leaves[0].description.as_deref(), Some("INTEGER"));
//! ```

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::types::{ColumnDescriptor, TableDescriptor};

/// Command identifier bound to table nodes; opens the table editor.
pub const VIEW_TABLE_COMMAND: &str = "localdb.viewTable";

/// Catalog access needed to build the tree.
///
/// Implemented by the SQLite schema inspector; tests can provide a fixed
/// catalog.
pub trait SchemaSource {
    /// Error reported when the catalog cannot be read.
    type Error: fmt::Display;

    /// Lists the user tables.
    fn tables(&self) -> Result<Vec<TableDescriptor>, Self::Error>;

    /// Lists the columns of one table in declaration order.
    fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, Self::Error>;
}

/// Whether a database is loaded behind the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeState {
    /// No database; the tree is empty.
    #[default]
    Unloaded,
    /// A database is open and its tables are visible.
    Loaded,
}

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A table; expandable into columns.
    Table,
    /// A column leaf.
    Column,
}

/// Host command invoked when a node is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandBinding {
    /// Command identifier.
    pub command: String,
    /// Human-readable title.
    pub title: String,
    /// Positional command arguments.
    pub arguments: Vec<String>,
}

/// One node of the table/column tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Table or column.
    pub kind: NodeKind,
    /// Display label: the table or column name.
    pub label: String,
    /// Owning table (the table itself for table nodes).
    pub table: String,
    /// Whether the node can be expanded.
    pub collapsible: bool,
    /// Short trailing text (the declared type for columns).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Multi-line hover text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Command run when the node is activated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandBinding>,
    /// Column metadata for column leaves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnDescriptor>,
}

impl TreeNode {
    /// Builds a collapsed table node bound to [`VIEW_TABLE_COMMAND`].
    pub fn table(table: &TableDescriptor) -> Self {
        Self {
            kind: NodeKind::Table,
            label: table.name.clone(),
            table: table.name.clone(),
            collapsible: true,
            description: None,
            tooltip: None,
            command: Some(CommandBinding {
                command: VIEW_TABLE_COMMAND.to_string(),
                title: "View Table Data".to_string(),
                arguments: vec![table.name.clone()],
            }),
            column: None,
        }
    }

    /// Builds a column leaf decorated with its metadata.
    pub fn column(table: &str, column: &ColumnDescriptor) -> Self {
        Self {
            kind: NodeKind::Column,
            label: column.name.clone(),
            table: table.to_string(),
            collapsible: false,
            description: Some(column.declared_type.clone()),
            tooltip: Some(column_tooltip(column)),
            command: None,
            column: Some(column.clone()),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn column_tooltip(column: &ColumnDescriptor) -> String {
    format!(
        "Type: {}\nNot Null: {}\nDefault Value: {}\nPrimary Key: {}\nAuto Increment: {}",
        column.declared_type,
        yes_no(column.not_null),
        column.default_value.as_deref().unwrap_or("None"),
        yes_no(column.is_primary_key()),
        yes_no(column.is_auto_increment()),
    )
}

type Listener = Box<dyn FnMut(u64)>;

/// Pull-based presenter for the table/column tree.
///
/// Holds only the loaded/unloaded state and a refresh generation counter;
/// the catalog is re-queried on every [`children`](Self::children) call.
#[derive(Default)]
pub struct TreePresenter {
    state: TreeState,
    generation: u64,
    listeners: Vec<Listener>,
}

impl fmt::Debug for TreePresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreePresenter")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TreePresenter {
    /// Creates an unloaded presenter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> TreeState {
        self.state
    }

    /// Number of refresh signals fired so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registers a callback fired with the new generation on every refresh.
    pub fn subscribe(&mut self, listener: impl FnMut(u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Switches to [`TreeState::Loaded`] and fires a refresh.
    pub fn mark_loaded(&mut self) {
        self.state = TreeState::Loaded;
        self.refresh();
    }

    /// Switches to [`TreeState::Unloaded`] and fires a refresh.
    pub fn mark_unloaded(&mut self) {
        self.state = TreeState::Unloaded;
        self.refresh();
    }

    /// Fires the change signal; consumers re-pull from the root.
    pub fn refresh(&mut self) -> u64 {
        self.generation += 1;
        debug!(generation = self.generation, state = ?self.state, "tree refresh");
        for listener in &mut self.listeners {
            listener(self.generation);
        }
        self.generation
    }

    /// Returns the children of `parent`, or the root nodes when `parent` is
    /// `None`.
    ///
    /// An unloaded tree and column leaves have no children.
    ///
    /// # Errors
    ///
    /// Propagates the catalog error from `source`.
    pub fn children<S: SchemaSource>(
        &self,
        source: &S,
        parent: Option<&TreeNode>,
    ) -> Result<Vec<TreeNode>, S::Error> {
        if self.state == TreeState::Unloaded {
            return Ok(Vec::new());
        }
        match parent {
            None => Ok(source.tables()?.iter().map(TreeNode::table).collect()),
            Some(node) if node.kind == NodeKind::Table => Ok(source
                .columns(&node.table)?
                .iter()
                .map(|column| TreeNode::column(&node.table, column))
                .collect()),
            Some(_) => Ok(Vec::new()),
        }
    }

    /// Expands the whole tree: every table node paired with its columns.
    ///
    /// # Errors
    ///
    /// Propagates the catalog error from `source`.
    pub fn expand_all<S: SchemaSource>(
        &self,
        source: &S,
    ) -> Result<Vec<(TreeNode, Vec<TreeNode>)>, S::Error> {
        let roots = self.children(source, None)?;
        let mut expanded = Vec::with_capacity(roots.len());
        for root in roots {
            let leaves = self.children(source, Some(&root))?;
            expanded.push((root, leaves));
        }
        Ok(expanded)
    }
}
