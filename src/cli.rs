use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{filter::RequiredFieldPlaceholder, registry::Format};

#[derive(Debug, Parser)]
#[command(author, version, about = "Dump and load table fixtures", long_about = None)]
pub struct Cli {
    /// Fixture configuration file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write table rows to CSV or YAML fixtures
    Dump(DumpArgs),
    /// Replace table rows with the contents of fixtures
    Load(LoadArgs),
    /// Show the column descriptors of one or more tables
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
pub struct TableSelection {
    /// Database directory containing schema.yml
    #[arg(long = "db")]
    pub db: PathBuf,
    /// Table to process, optionally mapped to a fixture file as `table=file`
    #[arg(short = 't', long = "table", action = clap::ArgAction::Append)]
    pub tables: Vec<String>,
    /// Process every table in the database
    #[arg(long, conflicts_with = "tables")]
    pub all: bool,
    /// Fixture directory (overrides the configured one)
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    #[command(flatten)]
    pub selection: TableSelection,
    /// Output format
    #[arg(short = 'f', long, value_parser = parse_format, default_value = "csv")]
    pub format: Format,
    /// Replace a column's dump rules with an expression: `table.column=expression`
    #[arg(long = "override", action = clap::ArgAction::Append)]
    pub overrides: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub selection: TableSelection,
    /// Input format; CSV is tried before YAML when omitted
    #[arg(short = 'f', long, value_parser = parse_format)]
    pub format: Option<Format>,
    /// How to fill required columns the fixture leaves empty
    #[arg(long, value_enum)]
    pub placeholder: Option<Placeholder>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Database directory containing schema.yml
    #[arg(long = "db")]
    pub db: PathBuf,
    /// Tables to describe (all tables when omitted)
    #[arg(short = 't', long = "table", action = clap::ArgAction::Append)]
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Placeholder {
    Default,
    ColumnName,
    Skip,
}

impl From<Placeholder> for RequiredFieldPlaceholder {
    fn from(value: Placeholder) -> Self {
        match value {
            Placeholder::Default => RequiredFieldPlaceholder::TypeDefault,
            Placeholder::ColumnName => RequiredFieldPlaceholder::ColumnName,
            Placeholder::Skip => RequiredFieldPlaceholder::Skip,
        }
    }
}

fn parse_format(value: &str) -> Result<Format, String> {
    value.parse()
}
