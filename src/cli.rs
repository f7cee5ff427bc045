use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::link::JoinSpec;

#[derive(Debug, Parser)]
#[command(author, version, about = "Merge document-store tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the user tables in a document
    Tables(TablesArgs),
    /// Show column metadata for one table
    Columns(ColumnsArgs),
    /// Merge two tables into a new combined table
    Merge(MergeArgs),
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Document file (JSON) to inspect
    #[arg(short = 'd', long = "doc")]
    pub doc: PathBuf,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Document file (JSON) to inspect
    #[arg(short = 'd', long = "doc")]
    pub doc: PathBuf,
    /// Table whose columns to describe
    #[arg(short, long)]
    pub table: String,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Document file (JSON) to read and write back
    #[arg(short = 'd', long = "doc")]
    pub doc: PathBuf,
    /// Left (driving) table; every one of its rows appears in the output
    #[arg(long)]
    pub left: String,
    /// Right table, matched against the left by the link column
    #[arg(long)]
    pub right: String,
    /// Link column: `common:<name>` for a column shared by both tables, or
    /// `ref:<name>` for a left-table reference column pointing at the right table
    #[arg(long)]
    pub link: String,
    /// Name of the merged table (defaults to `<left>_<right>_Merged`)
    #[arg(long)]
    pub dest: Option<String>,
    /// Restrict left-table columns to this comma-separated list
    #[arg(long = "left-columns", value_delimiter = ',')]
    pub left_columns: Vec<String>,
    /// Restrict right-table columns to this comma-separated list
    #[arg(long = "right-columns", value_delimiter = ',')]
    pub right_columns: Vec<String>,
}

/// Parses the `--link` value into a join strategy. A reference link targets
/// the right table by construction.
pub fn parse_link_spec(value: &str, right_table: &str) -> Result<JoinSpec> {
    match value.split_once(':') {
        Some(("common", name)) if !name.trim().is_empty() => {
            Ok(JoinSpec::SharedColumn(name.trim().to_string()))
        }
        Some(("ref", name)) if !name.trim().is_empty() => Ok(JoinSpec::ReferenceColumn {
            column: name.trim().to_string(),
            target: right_table.to_string(),
        }),
        _ => bail!("Link column must be 'common:<name>' or 'ref:<name>', got '{value}'"),
    }
}
