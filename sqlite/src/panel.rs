//! Request handlers for the console and table surfaces.
//!
//! A surface sends [`Request`] messages and renders the [`Response`]
//! messages it gets back. Failures never escape as errors here: they are
//! turned into `queryError` or error notices and the session stays usable.

use localdb_core::{Request, Response, Row, TableWindow};
use tracing::{debug, warn};

use crate::editor::{EditedRow, SaveReport};
use crate::error::{EditError, Result};
use crate::session::Session;

/// Handles `executeQuery` requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePanel;

impl ConsolePanel {
    /// Runs the query and replies with its result or its error message.
    pub fn handle(&self, session: &mut Session, request: Request) -> Vec<Response> {
        match request {
            Request::ExecuteQuery { query } => match session.run_query(&query) {
                Ok(outcome) => vec![Response::query_result(outcome.result)],
                Err(e) => vec![Response::QueryError {
                    error: e.to_string(),
                }],
            },
            other => vec![unsupported(&other)],
        }
    }
}

/// Editable view bound to one table.
///
/// Keeps the window it last rendered; saved rows are matched against it
/// by position, and their keys come from the loaded rows.
#[derive(Debug, Clone)]
pub struct TablePanel {
    window: TableWindow,
}

impl TablePanel {
    /// Loads `table` and binds a panel to it.
    ///
    /// # Errors
    ///
    /// See [`Session::load_table`].
    pub fn open(session: &Session, table: &str) -> Result<Self> {
        Ok(Self {
            window: session.load_table(table)?,
        })
    }

    /// Bound table.
    pub fn table(&self) -> &str {
        &self.window.table
    }

    /// Last loaded window.
    pub fn window(&self) -> &TableWindow {
        &self.window
    }

    /// Full render of the current window.
    pub fn render(&self) -> Response {
        Response::render(&self.window)
    }

    /// Re-reads the bound table.
    ///
    /// # Errors
    ///
    /// See [`Session::load_table`].
    pub fn reload(&mut self, session: &Session) -> Result<()> {
        self.window = session.load_table(&self.window.table)?;
        Ok(())
    }

    /// Handles `saveData` and `refreshData`.
    pub fn handle(&mut self, session: &mut Session, request: Request) -> Vec<Response> {
        match request {
            Request::SaveData { data } => match self.save(session, data) {
                Ok(report) => {
                    debug!(table = self.table(), ?report, "panel saved");
                    if let Err(e) = self.reload(session) {
                        return vec![
                            Response::info("Data saved successfully."),
                            Response::error(format!("Error refreshing data: {e}")),
                        ];
                    }
                    vec![Response::info("Data saved successfully."), self.render()]
                }
                Err(e) => vec![Response::error(format!("Error saving data: {e}"))],
            },
            Request::RefreshData { table_name } => {
                if table_name != self.window.table {
                    warn!(requested = %table_name, bound = self.table(), "refresh for another table");
                }
                match self.reload(session) {
                    Ok(()) => vec![self.render()],
                    Err(e) => vec![Response::error(format!("Error refreshing data: {e}"))],
                }
            }
            other => vec![unsupported(&other)],
        }
    }

    /// Pairs each submitted row with the loaded row at the same position
    /// and saves the rows that changed.
    fn save(&self, session: &mut Session, data: Vec<Row>) -> Result<SaveReport> {
        let loaded = &self.window.rows;
        if data.len() != loaded.len() {
            return Err(EditError::RowCountMismatch {
                expected: loaded.len(),
                actual: data.len(),
            }
            .into());
        }

        let mut edits = Vec::new();
        for (index, (original, edited)) in loaded.iter().zip(data).enumerate() {
            for column in &self.window.key_columns {
                let before = original.get(column).cloned().unwrap_or_default();
                match edited.get(column) {
                    None => {
                        return Err(EditError::MissingKey {
                            row: index,
                            column: column.clone(),
                        }
                        .into());
                    }
                    Some(after) if !after.loosely_equals(&before) => {
                        return Err(EditError::KeyEdited {
                            row: index,
                            column: column.clone(),
                        }
                        .into());
                    }
                    Some(_) => {}
                }
            }

            let changed: Row = edited
                .iter()
                .filter(|(column, value)| {
                    self.window.key_columns.iter().any(|k| k == column)
                        || original
                            .get(column)
                            .is_none_or(|before| !value.loosely_equals(before))
                })
                .map(|(column, value)| (column, value.clone()))
                .collect();
            if changed.len() > self.window.key_columns.len() {
                edits.push(EditedRow::new(self.window.key_of(original), changed));
            }
        }

        if edits.is_empty() {
            return Ok(SaveReport {
                submitted: 0,
                updated: 0,
            });
        }
        session.save_table(&self.window.table, &edits)
    }
}

/// Routes requests to the console or the bound table panel.
#[derive(Debug, Default)]
pub struct PanelRouter {
    console: ConsolePanel,
    table: Option<TablePanel>,
}

impl PanelRouter {
    /// Creates a router with no table bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound table panel, if any.
    pub fn table(&self) -> Option<&TablePanel> {
        self.table.as_ref()
    }

    /// Dispatches one request.
    pub fn dispatch(&mut self, session: &mut Session, request: Request) -> Vec<Response> {
        match request {
            Request::ExecuteQuery { .. } => self.console.handle(session, request),
            Request::OpenTable { table_name } => match TablePanel::open(session, &table_name) {
                Ok(panel) => {
                    let render = panel.render();
                    self.table = Some(panel);
                    vec![render]
                }
                Err(e) => vec![Response::error(format!("Error loading table: {e}"))],
            },
            Request::SaveData { .. } | Request::RefreshData { .. } => match self.table.as_mut() {
                Some(panel) => panel.handle(session, request),
                None => vec![Response::error("No table is open; send openTable first.")],
            },
        }
    }
}

fn unsupported(request: &Request) -> Response {
    let name = match request {
        Request::ExecuteQuery { .. } => "executeQuery",
        Request::SaveData { .. } => "saveData",
        Request::RefreshData { .. } => "refreshData",
        Request::OpenTable { .. } => "openTable",
    };
    Response::error(format!("Unsupported command for this panel: {name}"))
}
