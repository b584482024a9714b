//! Storage collaborators.
//!
//! [`Store`] is the seam between the fixture pipeline and whatever holds the
//! rows. [`MemoryStore`] keeps tables in memory and enforces column
//! membership and nullability on insert. [`DirectoryStore`] persists the same
//! model on disk:
//!
//! ```text
//! db/
//!   schema.yml      # table name -> ordered column descriptors
//!   users.json      # JSON array of rows for table `users`
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    error::{FixtureError, Result},
    filter::Record,
    schema::{ColumnDescriptor, TableSchema},
};

pub const SCHEMA_FILE: &str = "schema.yml";

pub trait Store {
    fn table_names(&self) -> Result<Vec<String>>;

    fn schema(&self, table: &str) -> Result<TableSchema>;

    /// Every row of `table`, in storage order.
    fn rows(&self, table: &str) -> Result<Vec<Record>>;

    /// Removes every row of `table`, returning how many were removed.
    fn delete_all(&mut self, table: &str) -> Result<usize>;

    fn insert(&mut self, table: &str, record: Record) -> Result<()>;
}

#[derive(Debug, Clone)]
struct TableData {
    schema: TableSchema,
    rows: Vec<Record>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, TableData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(FixtureError::Store(format!(
                "Table {} already exists",
                schema.name
            )));
        }
        self.tables.insert(
            schema.name.clone(),
            TableData {
                schema,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&TableData> {
        self.tables
            .get(name)
            .ok_or_else(|| FixtureError::Store(format!("Table {name} not found")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableData> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| FixtureError::Store(format!("Table {name} not found")))
    }
}

fn validate_record(schema: &TableSchema, record: &Record) -> Result<()> {
    if let Some(unknown) = record.keys().find(|key| !schema.contains(key)) {
        return Err(FixtureError::Store(format!(
            "Unknown column '{unknown}' for table {}",
            schema.name
        )));
    }
    for column in schema.columns.iter().filter(|c| c.needs_completion()) {
        if record.get(&column.name).is_none_or(|v| v.is_null()) {
            return Err(FixtureError::Store(format!(
                "Column '{}' of table {} cannot be null",
                column.name, schema.name
            )));
        }
    }
    Ok(())
}

impl Store for MemoryStore {
    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        Ok(self.table(table)?.schema.clone())
    }

    fn rows(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.table(table)?.rows.clone())
    }

    fn delete_all(&mut self, table: &str) -> Result<usize> {
        let data = self.table_mut(table)?;
        let removed = data.rows.len();
        data.rows.clear();
        Ok(removed)
    }

    fn insert(&mut self, table: &str, record: Record) -> Result<()> {
        let data = self.table_mut(table)?;
        validate_record(&data.schema, &record)?;
        data.rows.push(record);
        Ok(())
    }
}

/// A [`MemoryStore`] backed by a directory. Changes are written by [`DirectoryStore::flush`].
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    inner: MemoryStore,
    dirty: BTreeSet<String>,
}

impl DirectoryStore {
    pub fn open(root: &Path) -> Result<Self> {
        let schema_path = root.join(SCHEMA_FILE);
        let file = File::open(&schema_path).map_err(|err| FixtureError::io(&schema_path, err))?;
        let tables: BTreeMap<String, Vec<ColumnDescriptor>> =
            serde_yaml::from_reader(BufReader::new(file))?;

        let mut inner = MemoryStore::new();
        for (name, columns) in tables {
            let rows_path = rows_path(root, &name);
            let rows: Vec<Record> = if rows_path.exists() {
                let file =
                    File::open(&rows_path).map_err(|err| FixtureError::io(&rows_path, err))?;
                serde_json::from_reader(BufReader::new(file))?
            } else {
                Vec::new()
            };
            debug!("Opened table {name} with {} row(s)", rows.len());
            inner.create_table(TableSchema::new(name.clone(), columns))?;
            inner.table_mut(&name)?.rows = rows;
        }
        Ok(DirectoryStore {
            root: root.to_path_buf(),
            inner,
            dirty: BTreeSet::new(),
        })
    }

    /// Creates `root` with an empty row file for every table in `tables`.
    pub fn create(root: &Path, tables: &[TableSchema]) -> Result<Self> {
        fs::create_dir_all(root).map_err(|err| FixtureError::io(root, err))?;
        let layout: BTreeMap<&str, &Vec<ColumnDescriptor>> = tables
            .iter()
            .map(|table| (table.name.as_str(), &table.columns))
            .collect();
        let schema_path = root.join(SCHEMA_FILE);
        let file =
            File::create(&schema_path).map_err(|err| FixtureError::io(&schema_path, err))?;
        serde_yaml::to_writer(file, &layout)?;

        let mut inner = MemoryStore::new();
        let mut dirty = BTreeSet::new();
        for table in tables {
            inner.create_table(table.clone())?;
            dirty.insert(table.name.clone());
        }
        let mut store = DirectoryStore {
            root: root.to_path_buf(),
            inner,
            dirty,
        };
        store.flush()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the row files of every table changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        for name in std::mem::take(&mut self.dirty) {
            let path = rows_path(&self.root, &name);
            let rows = self.inner.rows(&name)?;
            let file = File::create(&path).map_err(|err| FixtureError::io(&path, err))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &rows)?;
            writer.flush().map_err(|err| FixtureError::io(&path, err))?;
            debug!("Wrote {} row(s) to {path:?}", rows.len());
        }
        Ok(())
    }
}

fn rows_path(root: &Path, table: &str) -> PathBuf {
    root.join(format!("{table}.json"))
}

impl Store for DirectoryStore {
    fn table_names(&self) -> Result<Vec<String>> {
        self.inner.table_names()
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        self.inner.schema(table)
    }

    fn rows(&self, table: &str) -> Result<Vec<Record>> {
        self.inner.rows(table)
    }

    fn delete_all(&mut self, table: &str) -> Result<usize> {
        let removed = self.inner.delete_all(table)?;
        self.dirty.insert(table.to_string());
        Ok(removed)
    }

    fn insert(&mut self, table: &str, record: Record) -> Result<()> {
        self.inner.insert(table, record)?;
        self.dirty.insert(table.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::SemanticType};
    use tempfile::tempdir;

    fn accounts() -> TableSchema {
        TableSchema::new(
            "accounts",
            vec![
                ColumnDescriptor::new("id", SemanticType::Integer).not_null(),
                ColumnDescriptor::new("note", SemanticType::Text),
            ],
        )
    }

    #[test]
    fn memory_store_rejects_nulls_and_unknown_columns() {
        let mut store = MemoryStore::new();
        store.create_table(accounts()).unwrap();

        let mut record = Record::new();
        record.insert("note".into(), Value::from("x"));
        assert!(store.insert("accounts", record.clone()).is_err());

        record.insert("id".into(), Value::Integer(1));
        store.insert("accounts", record.clone()).unwrap();

        record.insert("extra".into(), Value::Integer(1));
        assert!(store.insert("accounts", record).is_err());
        assert_eq!(store.delete_all("accounts").unwrap(), 1);
        assert!(store.rows("missing").is_err());
    }

    #[test]
    fn directory_store_persists_rows_on_flush() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryStore::create(dir.path(), &[accounts()]).unwrap();
        let mut record = Record::new();
        record.insert("id".into(), Value::Integer(5));
        record.insert("note".into(), Value::Null);
        store.insert("accounts", record.clone()).unwrap();
        store.flush().unwrap();

        let reopened = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(reopened.schema("accounts").unwrap(), accounts());
        assert_eq!(reopened.rows("accounts").unwrap(), vec![record]);
    }
}
