//! Value and schema type definitions for local database browsing.
//!
//! This module defines the data model shared by every surface of the
//! browser: dynamically typed cell values, ordered result rows, result sets
//! that carry their column list independently of the rows, and the table and
//! column descriptors discovered from the SQLite catalog. All types are
//! designed for serialization with [`serde`] so they can cross the JSON
//! message boundary unchanged.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// JSON object key used to mark a base64-encoded blob.
pub const BLOB_KEY: &str = "$blob";

/// Errors raised when converting JSON into a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The JSON shape has no scalar equivalent (arrays, arbitrary objects).
    #[error("unsupported cell value: {0}")]
    Unsupported(String),
    /// A `{"$blob": ...}` object did not contain valid base64.
    #[error("invalid blob encoding: {0}")]
    InvalidBlob(String),
}

/// A single SQLite cell value.
///
/// SQLite is dynamically typed per cell, so every value carries its own
/// storage class. Blobs travel through JSON as `{"$blob": "<base64>"}` so
/// they are never stringified on the way to a surface and back.
///
/// # Examples
///
/// ```
/// use localdb_core::Value;
///
/// let v: Value = serde_json::from_str("42").unwrap();
/// assert_eq!(v, Value::Integer(42));
///
/// let v: Value = serde_json::from_str("1.5").unwrap();
/// assert_eq!(v, Value::Real(1.5));
///
/// let blob = Value::Blob(vec![0xde, 0xad]);
/// assert_eq!(serde_json::to_string(&blob).unwrap(), r#"{"$blob":"3q0="}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL` (the default).
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the SQLite storage class name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts a free-text answer into a value.
    ///
    /// An empty answer becomes `NULL`; anything else is kept as text and
    /// left to the column affinity to coerce.
    ///
    /// ```
    /// use localdb_core::Value;
    ///
    /// assert_eq!(Value::from_prompt(""), Value::Null);
    /// assert_eq!(Value::from_prompt("12"), Value::Text("12".into()));
    /// ```
    pub fn from_prompt(answer: &str) -> Self {
        if answer.is_empty() {
            Value::Null
        } else {
            Value::Text(answer.to_string())
        }
    }

    /// Compares two cells the way an edit surface sees them.
    ///
    /// Surfaces often send numbers back as text, so a value also matches
    /// when both sides render to the same text. Blobs only match exactly.
    ///
    /// ```
    /// use localdb_core::Value;
    ///
    /// assert!(Value::Integer(1).loosely_equals(&Value::Text("1".into())));
    /// assert!(!Value::Integer(1).loosely_equals(&Value::Integer(2)));
    /// ```
    pub fn loosely_equals(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Value::Blob(_), _) | (_, Value::Blob(_)) => false,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Converts a JSON value into a cell value.
    ///
    /// Booleans map to `0`/`1` the way SQLite stores them. Numbers that fit
    /// an `i64` stay integers, everything else numeric becomes real.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Unsupported`] for arrays and objects other
    /// than the blob marker, and [`ValueError::InvalidBlob`] for a blob
    /// marker holding invalid base64.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ValueError> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Integer(i64::from(b))),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => n
                    .as_f64()
                    .map(Value::Real)
                    .ok_or_else(|| ValueError::Unsupported(n.to_string())),
            },
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(encoded)) = map.get(BLOB_KEY) {
                        return BASE64
                            .decode(encoded)
                            .map(Value::Blob)
                            .map_err(|e| ValueError::InvalidBlob(e.to_string()));
                    }
                }
                Err(ValueError::Unsupported("object".to_string()))
            }
            serde_json::Value::Array(_) => Err(ValueError::Unsupported("array".to_string())),
        }
    }

    /// Converts this value into its JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(bytes) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    BLOB_KEY.to_string(),
                    serde_json::Value::String(BASE64.encode(bytes)),
                );
                serde_json::Value::Object(map)
            }
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value for a text table cell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BLOB_KEY, &BASE64.encode(bytes))?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(de::Error::custom)
    }
}

/// One result row: an ordered mapping from column name to [`Value`].
///
/// Column order is preserved through serialization in both directions, so a
/// row sent to a surface comes back with its cells in the same order.
///
/// # Examples
///
/// ```
/// use localdb_core::{Row, Value};
///
/// let mut row = Row::new();
/// row.push("id", 1);
/// row.push("name", "a");
/// assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
/// assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"id":1,"name":"a"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from parallel column and value lists.
    pub fn from_parts(columns: &[String], values: Vec<Value>) -> Self {
        Self {
            cells: columns.iter().cloned().zip(values).collect(),
        }
    }

    /// Appends a cell, replacing an existing cell of the same name in place.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Builder variant of [`push`](Self::push).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Looks up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the cells in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping column names to cell values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
        let mut row = Row::new();
        while let Some((column, value)) = access.next_entry::<String, Value>()? {
            row.push(column, value);
        }
        Ok(row)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}

/// Tabular result of a statement.
///
/// The column list is carried next to the rows rather than derived from the
/// first row, so a zero-row result still knows its shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in statement order.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Row>,
    /// `true` when a row cap cut the result short.
    #[serde(default)]
    pub truncated: bool,
}

impl ResultSet {
    /// Creates an empty result with the given columns.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            truncated: false,
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A table discovered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, unique within the database.
    pub name: String,
}

impl TableDescriptor {
    /// Creates a descriptor for the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Column metadata as reported by `PRAGMA table_info`.
///
/// # Examples
///
/// ```
/// use localdb_core::ColumnDescriptor;
///
/// let mut columns = vec![
///     ColumnDescriptor::new(0, "id", "INTEGER").primary_key(1),
///     ColumnDescriptor::new(1, "name", "TEXT"),
/// ];
/// ColumnDescriptor::mark_rowid_alias(&mut columns);
/// assert!(columns[0].is_primary_key());
/// assert!(columns[0].is_auto_increment());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Zero-based position in declaration order.
    pub ordinal: usize,
    /// Column name.
    pub name: String,
    /// Declared type text; free-form, possibly empty.
    pub declared_type: String,
    /// Whether a `NOT NULL` constraint is present.
    pub not_null: bool,
    /// SQL text of the default expression, if any.
    pub default_value: Option<String>,
    /// `0` when not part of the primary key, otherwise the 1-based position
    /// within the key.
    pub key_position: u32,
    /// Whether the column is the table's sole `INTEGER` primary key.
    #[serde(default)]
    pub rowid_alias: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable, non-key column without a default.
    pub fn new(ordinal: usize, name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            declared_type: declared_type.into(),
            not_null: false,
            default_value: None,
            key_position: 0,
            rowid_alias: false,
        }
    }

    /// Marks the column as part of the primary key at `position` (1-based).
    pub fn primary_key(mut self, position: u32) -> Self {
        self.key_position = position;
        self
    }

    /// Marks the column as the rowid alias.
    pub fn rowid_alias(mut self) -> Self {
        self.rowid_alias = true;
        self
    }

    /// Flags the rowid alias of a whole table's columns.
    ///
    /// Only a single-column `INTEGER` primary key aliases the rowid; every
    /// column of a composite key is cleared.
    pub fn mark_rowid_alias(columns: &mut [ColumnDescriptor]) {
        let key_size = columns.iter().filter(|c| c.is_primary_key()).count();
        for column in columns.iter_mut() {
            column.rowid_alias = key_size == 1
                && column.is_primary_key()
                && column.declared_type.eq_ignore_ascii_case("integer");
        }
    }

    /// Marks the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default expression text.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Returns `true` if the column is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.key_position > 0
    }

    /// Returns `true` for the sole `INTEGER` primary key, which aliases the
    /// rowid.
    pub fn is_auto_increment(&self) -> bool {
        self.rowid_alias
    }
}

/// A bounded window of rows loaded from one table for editing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableWindow {
    /// Table the rows came from.
    pub table: String,
    /// Catalog columns, in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names, in key order.
    pub key_columns: Vec<String>,
    /// Loaded rows, at most the window cap.
    pub rows: Vec<Row>,
}

impl TableWindow {
    /// Returns the column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns the key values of `row`, in key order.
    pub fn key_of(&self, row: &Row) -> Vec<Value> {
        self.key_columns
            .iter()
            .map(|k| row.get(k).cloned().unwrap_or_default())
            .collect()
    }
}
