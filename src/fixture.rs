//! Dump and load orchestration, one table at a time.
//!
//! A dump reads the schema and rows from a [`Store`], runs every row through
//! the [`DumpFilter`] and writes a CSV or YAML fixture. A load reads a
//! fixture, runs every record through the [`LoadFilter`], then replaces the
//! table's rows.
//!
//! Loads stage every record before touching the table, so coercion failures
//! leave the existing rows in place. Once the delete has run, inserts are not
//! wrapped in a transaction: a rejected insert leaves the table holding only
//! the rows inserted before it, and the returned
//! [`FixtureError::Persistence`] names that row.

use std::{
    collections::BTreeSet,
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    config::FixtureConfig,
    error::{FixtureError, Result},
    filter::{DumpFilter, DumpOverrides, EnrichmentHooks, LoadFilter, Record},
    io_utils,
    registry::{Format, Registry},
    rules::Pipeline,
    store::Store,
    yaml_fixture,
};

/// Which table to process and where its fixture lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRequest {
    pub table: String,
    /// Base file name without extension; defaults to the table name.
    pub file: Option<String>,
    /// Directory override; defaults to the configured dump/load directory.
    pub dir: Option<PathBuf>,
}

impl TableRequest {
    pub fn new(table: impl Into<String>) -> Self {
        TableRequest {
            table: table.into(),
            file: None,
            dir: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Parses `table` or `table=file`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (table, file) = match spec.split_once('=') {
            Some((table, file)) => (table.trim(), Some(file.trim())),
            None => (spec.trim(), None),
        };
        if table.is_empty() || file.is_some_and(str::is_empty) {
            return Err(FixtureError::Config(format!(
                "Table '{spec}' must look like table or table=file"
            )));
        }
        let request = TableRequest::new(table);
        Ok(match file {
            Some(file) => request.with_file(file),
            None => request,
        })
    }

    pub fn file_stem(&self) -> &str {
        self.file.as_deref().unwrap_or(&self.table)
    }

    pub fn path(&self, default_dir: &Path, format: Format) -> PathBuf {
        let dir = self.dir.as_deref().unwrap_or(default_dir);
        io_utils::fixture_path(dir, self.file_stem(), format)
    }
}

/// Columns present in a fixture that differ from the table's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub format: Format,
    pub table: String,
    /// `None` when the mismatch applies to the whole file (a CSV header).
    pub row: Option<usize>,
    pub missing: Vec<String>,
    pub surplus: Vec<String>,
}

impl SchemaMismatch {
    pub fn detect<'a>(
        format: Format,
        table: &str,
        row: Option<usize>,
        schema_columns: &[String],
        present: impl IntoIterator<Item = &'a String>,
    ) -> Option<Self> {
        let present = present.into_iter().collect::<BTreeSet<_>>();
        let expected = schema_columns.iter().collect::<BTreeSet<_>>();
        let missing = schema_columns
            .iter()
            .filter(|name| !present.contains(name))
            .cloned()
            .collect::<Vec<_>>();
        let surplus = present
            .difference(&expected)
            .map(|name| (*name).clone())
            .collect::<Vec<_>>();
        if missing.is_empty() && surplus.is_empty() {
            None
        } else {
            Some(SchemaMismatch {
                format,
                table: table.to_string(),
                row,
                missing,
                surplus,
            })
        }
    }
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fixture for {}", self.format.label(), self.table)?;
        if let Some(row) = self.row {
            write!(f, " row {row}")?;
        }
        if !self.missing.is_empty() {
            write!(f, ": missing column(s) [{}]", self.missing.iter().join(", "))?;
        }
        if !self.surplus.is_empty() {
            write!(f, ": left over column(s) [{}]", self.surplus.iter().join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub table: String,
    pub path: PathBuf,
    pub format: Format,
    pub deleted: usize,
    pub loaded: usize,
    pub warnings: Vec<SchemaMismatch>,
}

/// Runs dumps and loads with one registry, one set of overrides and hooks.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    config: FixtureConfig,
    registry: Registry,
    overrides: DumpOverrides,
    hooks: EnrichmentHooks,
}

impl Fixtures {
    pub fn new(config: FixtureConfig) -> Self {
        Fixtures {
            config,
            ..Fixtures::default()
        }
    }

    /// Like [`Fixtures::new`], with the config's expression overrides compiled.
    pub fn from_config(config: FixtureConfig) -> Result<Self> {
        let overrides = config.compile_overrides()?;
        Ok(Fixtures {
            overrides,
            ..Fixtures::new(config)
        })
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn add_override(&mut self, table: &str, column: &str, pipeline: impl Into<Pipeline>) {
        self.overrides.insert(table, column, pipeline);
    }

    pub fn register_hook<F>(&mut self, table: &str, hook: F)
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.hooks.register(table, hook);
    }

    /// Writes every row of the requested table and returns the fixture path.
    pub fn dump_table<S>(&self, store: &S, request: &TableRequest, format: Format) -> Result<PathBuf>
    where
        S: Store + ?Sized,
    {
        let table = request.table.as_str();
        let schema = store.schema(table)?;
        let rows = store.rows(table)?;
        let path = request.path(&self.config.dump_dir, format);
        if let Some(dir) = path.parent() {
            io_utils::ensure_dir(dir)?;
        }
        info!(
            "Dumping {} row(s) of {table} to {path:?} as {}",
            rows.len(),
            format.label()
        );

        let filter = DumpFilter::new(
            &self.registry,
            &schema,
            format,
            self.overrides.for_table(table),
        );
        let columns = schema.column_names();
        match format {
            Format::Csv => {
                let mut writer = io_utils::open_csv_writer(&path)?;
                writer.write_record(&columns)?;
                for (idx, row) in rows.iter().enumerate() {
                    let values = filter.apply(row).map_err(|err| err.at_row(table, idx))?;
                    writer.write_record(values.iter().map(io_utils::csv_field))?;
                }
                writer.flush().map_err(|err| FixtureError::io(&path, err))?;
            }
            Format::Yaml => {
                let file = File::create(&path).map_err(|err| FixtureError::io(&path, err))?;
                let mut writer = BufWriter::new(file);
                for (idx, row) in rows.iter().enumerate() {
                    let values = filter.apply(row).map_err(|err| err.at_row(table, idx))?;
                    let entry = yaml_fixture::render_entry(table, idx, &columns, &values);
                    writer
                        .write_all(entry.as_bytes())
                        .map_err(|err| FixtureError::io(&path, err))?;
                }
                writer.flush().map_err(|err| FixtureError::io(&path, err))?;
            }
        }
        Ok(path)
    }

    pub fn dump_tables<S>(
        &self,
        store: &S,
        requests: &[TableRequest],
        format: Format,
    ) -> Result<Vec<PathBuf>>
    where
        S: Store + ?Sized,
    {
        requests
            .iter()
            .map(|request| self.dump_table(store, request, format))
            .collect()
    }

    /// Finds the fixture to load. Without an explicit format CSV wins over YAML.
    pub fn resolve_load_source(
        &self,
        request: &TableRequest,
        format: Option<Format>,
    ) -> Result<(PathBuf, Format)> {
        let candidates = match format {
            Some(format) => vec![format],
            None => vec![Format::Csv, Format::Yaml],
        };
        candidates
            .iter()
            .map(|format| (request.path(&self.config.load_dir, *format), *format))
            .find(|(path, _)| path.is_file())
            .ok_or_else(|| FixtureError::FixtureNotFound {
                table: request.table.clone(),
                path: request.path(&self.config.load_dir, candidates[0]),
            })
    }

    /// Replaces the rows of the requested table with the fixture's records.
    pub fn load_table<S>(
        &self,
        store: &mut S,
        request: &TableRequest,
        format: Option<Format>,
    ) -> Result<LoadReport>
    where
        S: Store + ?Sized,
    {
        let table = request.table.as_str();
        let (path, format) = self.resolve_load_source(request, format)?;
        let schema = store.schema(table)?;
        let columns = schema.column_names();
        info!("Loading {table} from {path:?} as {}", format.label());

        let mut warnings = Vec::new();
        let raw_records: Vec<Record> = match format {
            Format::Csv => {
                let (headers, records) = io_utils::read_csv_fixture(&path)?;
                warnings.extend(SchemaMismatch::detect(
                    format, table, None, &columns, &headers,
                ));
                records
            }
            Format::Yaml => yaml_fixture::read_fixture(&path)?
                .into_iter()
                .enumerate()
                .map(|(idx, (key, record))| {
                    debug!("Read {key}");
                    warnings.extend(SchemaMismatch::detect(
                        format,
                        table,
                        Some(idx),
                        &columns,
                        record.keys(),
                    ));
                    record
                })
                .collect(),
        };
        for warning in &warnings {
            warn!("{warning}");
        }

        let filter = LoadFilter::new(&self.registry, &schema)
            .with_hook(self.hooks.get(table))
            .with_placeholder(self.config.required_placeholder);
        let staged = raw_records
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| filter.apply(raw).map_err(|err| err.at_row(table, idx)))
            .collect::<Result<Vec<_>>>()?;

        let deleted = store.delete_all(table)?;
        debug!("Deleted {deleted} existing row(s) from {table}");
        let loaded = staged.len();
        for (idx, record) in staged.into_iter().enumerate() {
            store
                .insert(table, record)
                .map_err(|err| FixtureError::persistence(table, idx, err.to_string()))?;
        }
        info!("Loaded {loaded} row(s) into {table}");

        Ok(LoadReport {
            table: table.to_string(),
            path,
            format,
            deleted,
            loaded,
            warnings,
        })
    }

    /// Loads several tables. Tables with no fixture on disk are skipped.
    pub fn load_tables<S>(
        &self,
        store: &mut S,
        requests: &[TableRequest],
        format: Option<Format>,
    ) -> Result<Vec<LoadReport>>
    where
        S: Store + ?Sized,
    {
        let mut reports = Vec::with_capacity(requests.len());
        for request in requests {
            match self.load_table(store, request, format) {
                Ok(report) => reports.push(report),
                Err(FixtureError::FixtureNotFound { table, path }) => {
                    warn!("Skipping {table}: no fixture at {path:?}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(reports)
    }

    /// One request per table the store knows about.
    pub fn all_tables<S>(store: &S) -> Result<Vec<TableRequest>>
    where
        S: Store + ?Sized,
    {
        Ok(store
            .table_names()?
            .into_iter()
            .map(TableRequest::new)
            .collect())
    }
}
