pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod io_utils;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod store;
pub mod table;
pub mod yaml_fixture;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, TableSelection},
    config::FixtureConfig,
    fixture::{Fixtures, TableRequest},
    store::{DirectoryStore, Store},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_fixtures", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            FixtureConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => FixtureConfig::default(),
    };
    match cli.command {
        Commands::Dump(args) => handle_dump(config, &args),
        Commands::Load(args) => handle_load(config, &args),
        Commands::Schema(args) => handle_schema(&args),
    }
}

fn handle_dump(mut config: FixtureConfig, args: &cli::DumpArgs) -> Result<()> {
    for spec in &args.overrides {
        config.add_override(spec)?;
    }
    if let Some(dir) = &args.selection.dir {
        config.dump_dir = dir.clone();
    }
    let fixtures = Fixtures::from_config(config)?;
    let store = open_store(&args.selection)?;
    let requests = table_requests(&store, &args.selection)?;
    let paths = fixtures.dump_tables(&store, &requests, args.format)?;
    info!("Wrote {} fixture(s) as {}", paths.len(), args.format.label());
    Ok(())
}

fn handle_load(mut config: FixtureConfig, args: &cli::LoadArgs) -> Result<()> {
    if let Some(dir) = &args.selection.dir {
        config.load_dir = dir.clone();
    }
    if let Some(placeholder) = args.placeholder {
        config.required_placeholder = placeholder.into();
    }
    let fixtures = Fixtures::from_config(config)?;
    let mut store = open_store(&args.selection)?;
    let requests = table_requests(&store, &args.selection)?;
    let reports = if args.selection.all {
        fixtures.load_tables(&mut store, &requests, args.format)?
    } else {
        requests
            .iter()
            .map(|request| fixtures.load_table(&mut store, request, args.format))
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    store
        .flush()
        .with_context(|| format!("Writing tables under {:?}", store.root()))?;
    let loaded: usize = reports.iter().map(|report| report.loaded).sum();
    info!("Loaded {loaded} row(s) into {} table(s)", reports.len());
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let store = DirectoryStore::open(&args.db)
        .with_context(|| format!("Opening database at {:?}", args.db))?;
    let tables = if args.tables.is_empty() {
        store.table_names()?
    } else {
        args.tables.clone()
    };
    for (idx, table) in tables.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let schema = store.schema(table)?;
        print!("{}", table::describe_schema(&schema));
    }
    Ok(())
}

fn open_store(selection: &TableSelection) -> Result<DirectoryStore> {
    DirectoryStore::open(&selection.db)
        .with_context(|| format!("Opening database at {:?}", selection.db))
}

fn table_requests(store: &DirectoryStore, selection: &TableSelection) -> Result<Vec<TableRequest>> {
    if selection.all {
        return Ok(Fixtures::all_tables(store)?);
    }
    if selection.tables.is_empty() {
        anyhow::bail!("Pass at least one --table or use --all");
    }
    let requests = selection
        .tables
        .iter()
        .map(|spec| TableRequest::parse(spec))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!("Tables: {:?}", requests);
    Ok(requests)
}
