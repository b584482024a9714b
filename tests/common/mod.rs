#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use table_fixtures::{
    data::Value,
    filter::Record,
    schema::{ColumnDescriptor, SemanticType, TableSchema},
    store::{DirectoryStore, MemoryStore},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` to `name`, creating parent directories as needed.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read temp file")
    }

    /// Creates a directory-backed database under `db/` holding `tables`.
    pub fn database(&self, tables: &[TableSchema]) -> DirectoryStore {
        DirectoryStore::create(&self.join("db"), tables).expect("create database")
    }
}

/// `users(id integer not null, name string, active boolean not null default)`
pub fn users_schema() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnDescriptor::new("id", SemanticType::Integer).not_null(),
            ColumnDescriptor::new("name", SemanticType::String),
            ColumnDescriptor::new("active", SemanticType::Boolean)
                .not_null()
                .with_default(),
        ],
    )
}

pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

pub fn memory_store(tables: &[TableSchema]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for table in tables {
        store.create_table(table.clone()).expect("create table");
    }
    store
}
