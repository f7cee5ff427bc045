pub mod batch;
pub mod cli;
pub mod data;
pub mod formula;
pub mod link;
pub mod memory;
pub mod merge;
pub mod schema;
pub mod store;
pub mod unify;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    memory::MemoryStore,
    merge::MergeRequest,
    store::DocumentStore,
    unify::ColumnSelection,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_merger", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Tables(args) => handle_tables(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Merge(args) => handle_merge(&args),
    }
}

fn handle_tables(args: &cli::TablesArgs) -> Result<()> {
    let store = MemoryStore::load(&args.doc)?;
    for table in store::user_tables(&store)? {
        println!("{table}");
    }
    Ok(())
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let store = MemoryStore::load(&args.doc)?;
    let columns = store
        .fetch_column_metadata(&args.table)
        .with_context(|| format!("Describing table '{}'", args.table))?;
    for column in columns.iter().filter(|c| !schema::is_system_column(&c.name)) {
        if column.is_computed {
            println!("{}\tformula\t{}", column.name, column.expression);
        } else {
            println!("{}\t{}", column.name, column.column_type);
        }
    }
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let mut store = MemoryStore::load(&args.doc)?;
    let join = cli::parse_link_spec(&args.link, &args.right)?;
    let destination = args
        .dest
        .clone()
        .unwrap_or_else(|| data::default_destination_name(&args.left, &args.right));

    let mut selection = ColumnSelection::all();
    if !args.left_columns.is_empty() {
        selection = selection.with_left(args.left_columns.iter().cloned());
    }
    if !args.right_columns.is_empty() {
        selection = selection.with_right(args.right_columns.iter().cloned());
    }

    let request = MergeRequest::new(&args.left, &args.right, join, &destination)
        .with_selection(selection);
    let summary = merge::execute(&mut store, &request, |progress| {
        info!(
            "Inserting rows ({}/{}), {}%",
            progress.rows_written,
            progress.total_rows,
            progress.percent()
        );
    })
    .with_context(|| format!("Merging '{}' and '{}'", args.left, args.right))?;

    store.save(&args.doc)?;
    println!("{}", summary.status_line());
    Ok(())
}
