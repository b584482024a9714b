//! YAML fixture documents.
//!
//! Each row is written as its own top-level entry keyed `{table}_{index}`:
//!
//! ```yaml
//! users_0:
//!   id: 1
//!   name: |-
//!     first line
//!     second line
//!   active: true
//! ```
//!
//! Values are written verbatim: the yaml dump pipelines have already produced
//! valid scalar text (the `null` token, block literals, quoted blanks).

use std::{fmt::Write as _, fs, path::Path};

use serde_yaml::Value as YamlValue;

use crate::{
    data::Value,
    error::{FixtureError, Result},
    filter::Record,
    registry::YAML_NULL,
};

pub fn entry_key(table: &str, index: usize) -> String {
    format!("{table}_{index}")
}

pub fn render_entry(table: &str, index: usize, columns: &[String], values: &[Value]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", entry_key(table, index));
    for (column, value) in columns.iter().zip(values) {
        let text = match value {
            Value::Null => YAML_NULL.to_string(),
            other => other.as_display(),
        };
        let _ = writeln!(out, "  {column}: {text}");
    }
    out
}

/// Parses a fixture document into `(key, record)` pairs in document order.
pub fn parse_fixture(input: &str, path: &Path) -> Result<Vec<(String, Record)>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: YamlValue = serde_yaml::from_str(input)?;
    let entries = match document {
        YamlValue::Null => return Ok(Vec::new()),
        YamlValue::Mapping(entries) => entries,
        _ => {
            return Err(FixtureError::InvalidFixture {
                path: path.to_path_buf(),
                message: "top level must be a mapping of records".to_string(),
            });
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (key, fields) in entries {
        let key = scalar_key(&key);
        let record = match fields {
            YamlValue::Null => Record::new(),
            YamlValue::Mapping(fields) => fields
                .iter()
                .map(|(column, value)| (scalar_key(column), Value::from_yaml(value)))
                .collect(),
            _ => {
                return Err(FixtureError::InvalidFixture {
                    path: path.to_path_buf(),
                    message: format!("entry '{key}' must be a mapping of column values"),
                });
            }
        };
        records.push((key, record));
    }
    Ok(records)
}

pub fn read_fixture(path: &Path) -> Result<Vec<(String, Record)>> {
    let raw = fs::read_to_string(path).map_err(|err| FixtureError::io(path, err))?;
    parse_fixture(&raw, path)
}

fn scalar_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        other => Value::from_yaml(other).as_display(),
    }
}
