//! Plain-text and JSON rendering of results, schemas and the tree.

use localdb_core::{ColumnDescriptor, Row, TableDescriptor, TreeNode, Value};

/// Output formats understood by the rendering helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Renders rows as an aligned text table with a header.
///
/// Cells are shown with their display form; `NULL` and blobs are
/// labelled. A table without rows still prints its header.
pub fn rows_to_table(columns: &[String], rows: &[Row]) -> String {
    if columns.is_empty() {
        return "(no result)\n".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map_or_else(String::new, Value::to_string))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_line(&mut out, columns.iter().map(String::as_str), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, rule.iter().map(String::as_str), &widths);
    for row in &cells {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out.push_str(&format!(
        "({} row{})\n",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

/// One table name per line.
pub fn tables_to_text(tables: &[TableDescriptor]) -> String {
    tables.iter().map(|t| format!("{}\n", t.name)).collect()
}

/// Column listing with type and constraint markers.
pub fn columns_to_text(columns: &[ColumnDescriptor]) -> String {
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(4);
    let mut out = String::new();
    for column in columns {
        let mut flags = Vec::new();
        if column.is_primary_key() {
            flags.push(format!("PK{}", column.key_position));
        }
        if column.not_null {
            flags.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default_value {
            flags.push(format!("DEFAULT {default}"));
        }
        let line = format!(
            "{:>3}  {:<width$}  {:<10} {}",
            column.ordinal,
            column.name,
            column.declared_type,
            flags.join(", "),
            width = width
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Indented tree: table nodes, and their column leaves when expanded.
pub fn tree_to_text(nodes: &[(TreeNode, Vec<TreeNode>)]) -> String {
    let mut out = String::new();
    for (table, leaves) in nodes {
        out.push_str(&table.label);
        out.push('\n');
        for leaf in leaves {
            match leaf.description.as_deref() {
                Some(kind) if !kind.is_empty() => {
                    out.push_str(&format!("  {}  {kind}\n", leaf.label));
                }
                _ => out.push_str(&format!("  {}\n", leaf.label)),
            }
        }
    }
    out
}
