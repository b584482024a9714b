//! Table schema model: semantic column types and column descriptors.
//!
//! [`SemanticType`] is the domain-level type of a column, independent of the
//! storage engine's native type. It selects which coercion pipelines the
//! [`crate::registry::Registry`] applies. [`TableSchema`] is the ordered list
//! of [`ColumnDescriptor`]s the store reports for a table; its order is the
//! CSV column order.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Binary,
    Boolean,
    Date,
    DateTime,
    Decimal,
    Float,
    Integer,
    String,
    Text,
    Time,
    Timestamp,
    /// A type name outside the supported set. Coerced with the identity rule.
    Other(String),
}

impl SemanticType {
    pub fn as_str(&self) -> &str {
        match self {
            SemanticType::Binary => "binary",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
            SemanticType::DateTime => "datetime",
            SemanticType::Decimal => "decimal",
            SemanticType::Float => "float",
            SemanticType::Integer => "integer",
            SemanticType::String => "string",
            SemanticType::Text => "text",
            SemanticType::Time => "time",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Other(name) => name,
        }
    }

    pub fn known() -> &'static [SemanticType] {
        &[
            SemanticType::Binary,
            SemanticType::Boolean,
            SemanticType::Date,
            SemanticType::DateTime,
            SemanticType::Decimal,
            SemanticType::Float,
            SemanticType::Integer,
            SemanticType::String,
            SemanticType::Text,
            SemanticType::Time,
            SemanticType::Timestamp,
        ]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "binary" | "blob" | "bytea" => SemanticType::Binary,
            "boolean" | "bool" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "datetime" | "date-time" => SemanticType::DateTime,
            "decimal" | "numeric" => SemanticType::Decimal,
            "float" | "double" | "real" => SemanticType::Float,
            "integer" | "int" | "bigint" => SemanticType::Integer,
            "string" | "varchar" => SemanticType::String,
            "text" => SemanticType::Text,
            "time" => SemanticType::Time,
            "timestamp" => SemanticType::Timestamp,
            _ => SemanticType::Other(value.trim().to_string()),
        })
    }
}

impl Serialize for SemanticType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SemanticType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        let Ok(parsed) = SemanticType::from_str(&token);
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    #[serde(default = "ColumnDescriptor::default_nullable")]
    pub nullable: bool,
    #[serde(default, alias = "default")]
    pub has_default: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        ColumnDescriptor {
            name: name.into(),
            semantic_type,
            nullable: true,
            has_default: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub const fn default_nullable() -> bool {
        true
    }

    /// Required columns the storage layer will not fill on its own.
    pub fn needs_completion(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        TableSchema {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_and_keeps_unknown_names() {
        assert_eq!("INT".parse::<SemanticType>().unwrap(), SemanticType::Integer);
        assert_eq!(
            "timestamp".parse::<SemanticType>().unwrap(),
            SemanticType::Timestamp
        );
        assert_eq!(
            "jsonb".parse::<SemanticType>().unwrap(),
            SemanticType::Other("jsonb".to_string())
        );
    }

    #[test]
    fn descriptor_yaml_defaults_to_nullable_without_default() {
        let column: ColumnDescriptor =
            serde_yaml::from_str("name: id\ntype: integer\nnullable: false\n").unwrap();
        assert_eq!(column.semantic_type, SemanticType::Integer);
        assert!(!column.nullable);
        assert!(!column.has_default);
        assert!(column.needs_completion());

        let column: ColumnDescriptor = serde_yaml::from_str("name: note\ntype: text\n").unwrap();
        assert!(column.nullable);
    }
}
