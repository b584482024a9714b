//! Plain-text rendering of table schemas for the `schema` command.

use std::{borrow::Cow, fmt::Write as _};

use crate::schema::TableSchema;

const SCHEMA_HEADERS: [&str; 4] = ["column", "type", "nullable", "default"];

/// One row per column: name, semantic type, nullability, server default.
pub fn describe_schema(schema: &TableSchema) -> String {
    let headers = SCHEMA_HEADERS.map(str::to_string);
    let rows = schema
        .columns
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                column.semantic_type.to_string(),
                yes_no(column.nullable),
                yes_no(column.has_default),
            ]
        })
        .collect::<Vec<_>>();
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} column(s))", schema.name, schema.columns.len());
    out.push_str(&render_table(&headers, &rows));
    out
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", flatten(value), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, SemanticType};

    #[test]
    fn describes_columns_in_schema_order() {
        let schema = TableSchema::new(
            "users",
            vec![
                ColumnDescriptor::new("id", SemanticType::Integer).not_null(),
                ColumnDescriptor::new("active", SemanticType::Boolean)
                    .not_null()
                    .with_default(),
            ],
        );
        let rendered = describe_schema(&schema);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "users (2 column(s))");
        assert_eq!(lines[1], "column  type     nullable  default");
        assert_eq!(lines[3], "id      integer  no        no");
        assert_eq!(lines[4], "active  boolean  no        yes");
    }
}
