//! Fixture configuration.
//!
//! Loaded from YAML; every field is optional:
//!
//! ```yaml
//! dump_dir: fixtures/out
//! load_dir: fixtures
//! required_placeholder: type-default   # or column-name, skip
//! overrides:
//!   users:
//!     password: '"[redacted]"'
//!     score: value * 100
//! ```

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FixtureError, Result},
    filter::{DumpOverrides, RequiredFieldPlaceholder},
    rules::Rule,
};

pub const DEFAULT_FIXTURE_DIR: &str = "fixtures";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub dump_dir: PathBuf,
    pub load_dir: PathBuf,
    pub required_placeholder: RequiredFieldPlaceholder,
    /// table -> column -> expression evaluated with the stored value bound as `value`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        FixtureConfig {
            dump_dir: PathBuf::from(DEFAULT_FIXTURE_DIR),
            load_dir: PathBuf::from(DEFAULT_FIXTURE_DIR),
            required_placeholder: RequiredFieldPlaceholder::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl FixtureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| FixtureError::io(path, err))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| FixtureError::Config(format!("Parsing {path:?}: {err}")))
    }

    /// Adds an override given as `table.column=expression`.
    pub fn add_override(&mut self, spec: &str) -> Result<()> {
        let (target, expression) = spec
            .split_once('=')
            .map(|(t, e)| (t.trim(), e.trim()))
            .filter(|(t, e)| !t.is_empty() && !e.is_empty())
            .ok_or_else(|| {
                FixtureError::Config(format!(
                    "Override '{spec}' must look like table.column=expression"
                ))
            })?;
        let (table, column) = target
            .split_once('.')
            .filter(|(t, c)| !t.is_empty() && !c.is_empty())
            .ok_or_else(|| {
                FixtureError::Config(format!("Override target '{target}' must be table.column"))
            })?;
        self.overrides
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), expression.to_string());
        Ok(())
    }

    pub fn compile_overrides(&self) -> Result<DumpOverrides> {
        let mut compiled = DumpOverrides::new();
        for (table, columns) in &self.overrides {
            for (column, expression) in columns {
                compiled.insert(table, column, Rule::expression(expression)?);
            }
        }
        Ok(compiled)
    }
}
