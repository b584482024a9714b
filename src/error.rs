//! Error types for fixture dump and load.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SemanticType;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, FixtureError>;

/// A single rule refused its input. Rules report only the reason; the filter
/// attaches the column context when it turns this into a [`FixtureError`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct RuleFault(pub String);

impl RuleFault {
    pub fn new(message: impl Into<String>) -> Self {
        RuleFault(message.into())
    }
}

#[derive(Error, Debug)]
pub enum FixtureError {
    /// A raw value could not be converted to the column's declared type
    #[error("Cannot coerce {raw} into {column_type} for column '{column}': {reason}")]
    Coercion {
        column: String,
        column_type: SemanticType,
        raw: String,
        reason: String,
    },

    /// The storage collaborator rejected a row
    #[error("Persisting row {row} of table {table} failed: {message}")]
    Persistence {
        table: String,
        row: usize,
        message: String,
    },

    /// Loading or dumping a table failed at a given row
    #[error("Table {table}, row {row}: {source}")]
    Row {
        table: String,
        row: usize,
        #[source]
        source: Box<FixtureError>,
    },

    /// Store lookups (unknown table, unreadable store files)
    #[error("Store error: {0}")]
    Store(String),

    /// No fixture file exists for a table
    #[error("No fixture found for table {table} at {path:?}")]
    FixtureNotFound { table: String, path: PathBuf },

    /// Malformed fixture document
    #[error("Invalid fixture {path:?}: {message}")]
    InvalidFixture { path: PathBuf, message: String },

    /// Expression-based rules that fail to compile
    #[error("Invalid expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FixtureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixtureError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn persistence(table: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        FixtureError::Persistence {
            table: table.into(),
            row,
            message: message.into(),
        }
    }

    /// Attach the table name and row index to an error raised while handling one record.
    pub fn at_row(self, table: &str, row: usize) -> Self {
        match self {
            already @ (FixtureError::Row { .. } | FixtureError::Persistence { .. }) => already,
            other => FixtureError::Row {
                table: table.to_string(),
                row,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping row wrappers.
    pub fn root(&self) -> &FixtureError {
        match self {
            FixtureError::Row { source, .. } => source.root(),
            other => other,
        }
    }
}
