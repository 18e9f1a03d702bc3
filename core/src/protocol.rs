//! JSON message envelopes exchanged between a surface and the backend.
//!
//! Every message is an object tagged by its `command` field:
//!
//! ```json
//! {"command": "executeQuery", "query": "SELECT 1"}
//! {"command": "queryResult", "data": [{"1": 1}], "columns": ["1"], "truncated": false}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{ResultSet, Row, TableWindow};

/// Message sent by a surface.
///
/// # Examples
///
/// ```
/// use localdb_core::Request;
///
/// let req: Request = serde_json::from_str(r#"{"command":"refreshData","tableName":"users"}"#).unwrap();
/// assert_eq!(req, Request::RefreshData { table_name: "users".into() });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Request {
    /// Run free-text SQL in the query console.
    ExecuteQuery {
        /// SQL text.
        query: String,
    },
    /// Save the edited rows of the bound table panel.
    SaveData {
        /// Every row shown in the panel, in display order.
        data: Vec<Row>,
    },
    /// Reload the bound table panel.
    #[serde(rename_all = "camelCase")]
    RefreshData {
        /// Table to reload.
        table_name: String,
    },
    /// Bind a table panel to a table and render it.
    #[serde(rename_all = "camelCase")]
    OpenTable {
        /// Table to open.
        table_name: String,
    },
}

/// Severity of a [`Response::Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational toast.
    Info,
    /// Error toast.
    Error,
}

/// Message sent back to a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Response {
    /// Successful console query.
    QueryResult {
        /// Result rows.
        data: Vec<Row>,
        /// Column names, present even when `data` is empty.
        columns: Vec<String>,
        /// Whether the row cap cut the result short.
        truncated: bool,
    },
    /// Failed console query.
    QueryError {
        /// Engine message.
        error: String,
    },
    /// Full (re-)render of a table panel.
    #[serde(rename_all = "camelCase")]
    Render {
        /// Table shown in the panel.
        table_name: String,
        /// Column names in declaration order.
        columns: Vec<String>,
        /// Primary key columns; these cells are read-only.
        key_columns: Vec<String>,
        /// Window rows.
        rows: Vec<Row>,
    },
    /// Toast message.
    Notice {
        /// Severity.
        level: NoticeLevel,
        /// Human-readable text.
        message: String,
    },
}

impl Response {
    /// Wraps a console result.
    pub fn query_result(result: ResultSet) -> Self {
        Response::QueryResult {
            data: result.rows,
            columns: result.columns,
            truncated: result.truncated,
        }
    }

    /// Renders a loaded table window.
    pub fn render(window: &TableWindow) -> Self {
        Response::Render {
            table_name: window.table.clone(),
            columns: window.column_names(),
            key_columns: window.key_columns.clone(),
            rows: window.rows.clone(),
        }
    }

    /// Informational toast.
    pub fn info(message: impl Into<String>) -> Self {
        Response::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Error toast.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_parse_execute_query() {
        let req: Request =
            serde_json::from_str(r#"{"command":"executeQuery","query":"SELECT 1"}"#).unwrap();
        assert_eq!(
            req,
            Request::ExecuteQuery {
                query: "SELECT 1".into()
            }
        );
    }

    #[test]
    fn test_parse_save_data_keeps_typed_cells() {
        let req: Request = serde_json::from_str(
            r#"{"command":"saveData","data":[{"id":1,"name":"b","score":null}]}"#,
        )
        .unwrap();
        let Request::SaveData { data } = req else {
            panic!("expected saveData");
        };
        assert_eq!(data[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(data[0].get("score"), Some(&Value::Null));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"command":"dropEverything"}"#).is_err());
    }

    #[test]
    fn test_query_error_shape() {
        let json = serde_json::to_value(Response::QueryError {
            error: "no such table: nonexistent".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "queryError", "error": "no such table: nonexistent"})
        );
    }

    #[test]
    fn test_render_uses_camel_case_fields() {
        let window = TableWindow {
            table: "t".into(),
            columns: vec![crate::ColumnDescriptor::new(0, "id", "INTEGER").primary_key(1)],
            key_columns: vec!["id".into()],
            rows: vec![Row::new().with("id", 1)],
        };
        let json = serde_json::to_value(Response::render(&window)).unwrap();
        assert_eq!(json["command"], "render");
        assert_eq!(json["tableName"], "t");
        assert_eq!(json["keyColumns"], serde_json::json!(["id"]));
        assert_eq!(json["rows"], serde_json::json!([{"id": 1}]));
    }

    #[test]
    fn test_notice_level_lowercase() {
        let json = serde_json::to_value(Response::info("Data saved successfully.")).unwrap();
        assert_eq!(json["level"], "info");
    }
}
