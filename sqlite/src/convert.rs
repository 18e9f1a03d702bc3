//! Conversion between [`Value`] cells and rusqlite values.
//!
//! The engine side uses [`rusqlite::types::Value`] for bound parameters and
//! [`ValueRef`] when reading; the browser side uses the tagged [`Value`].
//! Text that is not valid UTF-8 is decoded lossily.

use localdb_core::{ResultSet, Row, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Rows, Statement};

/// Converts a browser value into an owned engine value for binding.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Converts a borrowed engine value into a browser value.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Returns the result column names of a prepared statement.
pub(crate) fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Reads rows into a [`ResultSet`], stopping after `limit` rows.
///
/// When a row beyond the limit exists the result is marked truncated and
/// the remaining rows are not stepped.
pub(crate) fn collect_rows(
    rows: &mut Rows<'_>,
    columns: Vec<String>,
    limit: Option<usize>,
) -> rusqlite::Result<ResultSet> {
    let mut result = ResultSet::with_columns(columns);
    while let Some(row) = rows.next()? {
        if limit.is_some_and(|cap| result.rows.len() >= cap) {
            result.truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(result.columns.len());
        for idx in 0..result.columns.len() {
            values.push(from_sql(row.get_ref(idx)?));
        }
        result.rows.push(Row::from_parts(&result.columns, values));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_scalar_mapping() {
        assert_eq!(to_sql(&Value::Integer(3)), SqlValue::Integer(3));
        assert_eq!(to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(from_sql(ValueRef::Real(1.5)), Value::Real(1.5));
        assert_eq!(from_sql(ValueRef::Text(b"hi")), Value::Text("hi".into()));
        assert_eq!(from_sql(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
    }

    #[test]
    fn test_collect_rows_respects_limit() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare(
                "WITH RECURSIVE n(value) AS (SELECT 1 UNION ALL SELECT value + 1 FROM n WHERE value < 5) \
                 SELECT value FROM n",
            )
            .unwrap();
        let columns = column_names(&stmt);
        let mut rows = stmt.query([]).unwrap();
        let result = collect_rows(&mut rows, columns, Some(3)).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.truncated);
        assert_eq!(result.rows[2].get("value"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_collect_rows_exact_limit_is_not_truncated() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1 AS a UNION ALL SELECT 2").unwrap();
        let columns = column_names(&stmt);
        let mut rows = stmt.query([]).unwrap();
        let result = collect_rows(&mut rows, columns, Some(2)).unwrap();
        assert_eq!(result.len(), 2);
        assert!(!result.truncated);
    }

    #[test]
    fn test_collect_rows_keeps_typed_cells() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT NULL AS n, 1 AS i, 2.5 AS r, 'x' AS t, x'00ff' AS b")
            .unwrap();
        let columns = column_names(&stmt);
        let mut rows = stmt.query([]).unwrap();
        let result = collect_rows(&mut rows, columns, None).unwrap();
        let row = &result.rows[0];
        assert_eq!(row.get("n"), Some(&Value::Null));
        assert_eq!(row.get("i"), Some(&Value::Integer(1)));
        assert_eq!(row.get("r"), Some(&Value::Real(2.5)));
        assert_eq!(row.get("t"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("b"), Some(&Value::Blob(vec![0, 255])));
    }
}
