//! Record materialization in both directions.
//!
//! [`DumpFilter`] turns a stored row into one representation per schema
//! column, in schema order. [`LoadFilter`] turns a raw fixture record into a
//! schema-conformant record: unknown keys dropped, present values coerced,
//! required gaps filled, and the table's enrichment hook applied before the
//! final default completion.

use std::{collections::BTreeMap, collections::HashMap, fmt, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::{FixtureError, Result, RuleFault},
    registry::{Format, Registry, quote_for_yaml},
    rules::Pipeline,
    schema::{ColumnDescriptor, TableSchema},
};

pub type Record = BTreeMap<String, Value>;

pub type EnrichFn = dyn Fn(Record) -> Record + Send + Sync;

/// What to put into a required column that is still null right after coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredFieldPlaceholder {
    /// The type's default value.
    #[default]
    TypeDefault,
    /// The column's own name run through the type's load pipeline. Enrichment
    /// hooks written against the legacy loader expect this placeholder.
    ColumnName,
    /// Leave the column null until the hook and the final completion run.
    Skip,
}

/// Per-table callbacks run on every loaded record.
#[derive(Clone, Default)]
pub struct EnrichmentHooks {
    hooks: HashMap<String, Arc<EnrichFn>>,
}

impl EnrichmentHooks {
    pub fn new() -> Self {
        EnrichmentHooks::default()
    }

    pub fn register<F>(&mut self, table: &str, hook: F)
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.hooks.insert(table.to_string(), Arc::new(hook));
    }

    pub fn get(&self, table: &str) -> Option<&EnrichFn> {
        self.hooks.get(table).map(|hook| hook.as_ref())
    }
}

impl fmt::Debug for EnrichmentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

/// Per-table, per-column dump pipelines that replace the registry's.
#[derive(Debug, Clone, Default)]
pub struct DumpOverrides {
    tables: HashMap<String, HashMap<String, Pipeline>>,
}

impl DumpOverrides {
    pub fn new() -> Self {
        DumpOverrides::default()
    }

    pub fn insert(&mut self, table: &str, column: &str, pipeline: impl Into<Pipeline>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), pipeline.into());
    }

    pub fn get(&self, table: &str, column: &str) -> Option<&Pipeline> {
        self.tables.get(table).and_then(|columns| columns.get(column))
    }

    pub fn for_table(&self, table: &str) -> Option<&HashMap<String, Pipeline>> {
        self.tables.get(table)
    }
}

fn coercion_error(column: &ColumnDescriptor, raw: &Value, fault: RuleFault) -> FixtureError {
    FixtureError::Coercion {
        column: column.name.clone(),
        column_type: column.semantic_type.clone(),
        raw: format!("{:?}", raw.as_display()),
        reason: fault.0,
    }
}

pub struct DumpFilter<'a> {
    registry: &'a Registry,
    schema: &'a TableSchema,
    format: Format,
    overrides: Option<&'a HashMap<String, Pipeline>>,
}

impl<'a> DumpFilter<'a> {
    pub fn new(
        registry: &'a Registry,
        schema: &'a TableSchema,
        format: Format,
        overrides: Option<&'a HashMap<String, Pipeline>>,
    ) -> Self {
        DumpFilter {
            registry,
            schema,
            format,
            overrides,
        }
    }

    /// One representation per schema column, in schema order.
    ///
    /// In YAML, override results and values of types without a registered
    /// pipeline are quoted, since nothing upstream escaped them.
    pub fn apply(&self, row: &Record) -> Result<Vec<Value>> {
        self.schema
            .columns
            .iter()
            .map(|column| {
                let raw = row.get(&column.name).cloned().unwrap_or_default();
                let custom = self.overrides.and_then(|o| o.get(&column.name));
                let escaped = custom.is_none()
                    && self
                        .registry
                        .has_dump_pipeline(&column.semantic_type, self.format);
                let result = match custom {
                    Some(pipeline) => pipeline.run(raw.clone()),
                    None => self.registry.dump(&column.semantic_type, raw.clone(), self.format),
                };
                result
                    .map(|value| match self.format {
                        Format::Yaml if !escaped => quote_for_yaml(value),
                        _ => value,
                    })
                    .map_err(|fault| coercion_error(column, &raw, fault))
            })
            .collect()
    }
}

pub fn dump_row(
    registry: &Registry,
    schema: &TableSchema,
    row: &Record,
    format: Format,
    overrides: Option<&HashMap<String, Pipeline>>,
) -> Result<Vec<Value>> {
    DumpFilter::new(registry, schema, format, overrides).apply(row)
}

pub struct LoadFilter<'a> {
    registry: &'a Registry,
    schema: &'a TableSchema,
    hook: Option<&'a EnrichFn>,
    placeholder: RequiredFieldPlaceholder,
}

impl<'a> LoadFilter<'a> {
    pub fn new(registry: &'a Registry, schema: &'a TableSchema) -> Self {
        LoadFilter {
            registry,
            schema,
            hook: None,
            placeholder: RequiredFieldPlaceholder::default(),
        }
    }

    pub fn with_hook(mut self, hook: Option<&'a EnrichFn>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_placeholder(mut self, placeholder: RequiredFieldPlaceholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn apply(&self, mut raw: Record) -> Result<Record> {
        raw.retain(|key, _| self.schema.contains(key));

        let mut target: Record = self
            .schema
            .columns
            .iter()
            .map(|column| (column.name.clone(), Value::Null))
            .collect();

        for column in &self.schema.columns {
            let Some(value) = raw.remove(&column.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let coerced = self
                .registry
                .load(&column.semantic_type, value.clone())
                .map_err(|fault| coercion_error(column, &value, fault))?;
            target.insert(column.name.clone(), coerced);
        }

        for column in self.schema.columns.iter().filter(|c| !c.nullable) {
            if is_unset(&target, &column.name)
                && let Some(placeholder) = self.placeholder_for(column)
            {
                target.insert(column.name.clone(), placeholder);
            }
        }

        if let Some(hook) = self.hook {
            target = hook(target);
        }

        for column in self.schema.columns.iter().filter(|c| c.needs_completion()) {
            if !is_unset(&target, &column.name) {
                continue;
            }
            match self.registry.default_for(&column.semantic_type) {
                Some(default) => {
                    target.insert(column.name.clone(), default);
                }
                None => debug!(
                    "No default for column '{}' of type {}",
                    column.name, column.semantic_type
                ),
            }
        }

        Ok(target)
    }

    fn placeholder_for(&self, column: &ColumnDescriptor) -> Option<Value> {
        match self.placeholder {
            RequiredFieldPlaceholder::TypeDefault => {
                self.registry.default_for(&column.semantic_type)
            }
            RequiredFieldPlaceholder::ColumnName => {
                match self
                    .registry
                    .load(&column.semantic_type, Value::from(column.name.as_str()))
                {
                    Ok(value) => Some(value),
                    Err(fault) => {
                        debug!(
                            "Column name '{}' is not a valid {} placeholder: {fault}",
                            column.name, column.semantic_type
                        );
                        None
                    }
                }
            }
            RequiredFieldPlaceholder::Skip => None,
        }
    }
}

fn is_unset(record: &Record, column: &str) -> bool {
    record.get(column).is_none_or(Value::is_null)
}

pub fn load_record(
    registry: &Registry,
    schema: &TableSchema,
    raw: Record,
    hook: Option<&EnrichFn>,
) -> Result<Record> {
    LoadFilter::new(registry, schema).with_hook(hook).apply(raw)
}
