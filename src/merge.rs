//! The merge engine: record assembly plus end-to-end orchestration.
//!
//! One invocation is a pure function of an immutable [`MergeRequest`]; no
//! state survives between runs. Phases run strictly in sequence (normalize,
//! unify, resolve link, merge records, create table, insert batches, migrate
//! formulas) with one store request in flight at a time.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    batch::{self, BatchProgress, BatchRun},
    data::{Value, sanitize_table_name},
    formula::{FormulaOutcome, migrate_formulas},
    link::{JoinSpec, RowMatcher},
    schema::{ColumnDescriptor, normalize_columns},
    store::{DocumentStore, RawTable},
    unify::{ColumnSelection, OutputColumn, Side, unify},
};

/// One output row keyed by stored-column name, in left-table row order.
pub type MergedRecord = BTreeMap<String, Value>;

/// Terminal merge failures. Metadata and formula problems degrade gracefully
/// and never appear here.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("destination table name '{name}' is empty after sanitization")]
    InvalidDestination { name: String },
    #[error("could not create destination table '{table}'")]
    SchemaCreation {
        table: String,
        #[source]
        source: anyhow::Error,
    },
    /// Rows from batches before `batch_index` remain in the destination; the
    /// engine performs no rollback.
    #[error("bulk insert into '{table}' failed at batch {batch_index}")]
    BatchInsert {
        table: String,
        batch_index: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Everything one merge run needs, fixed up front.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub left_table: String,
    pub right_table: String,
    pub join: JoinSpec,
    pub destination: String,
    pub selection: ColumnSelection,
}

impl MergeRequest {
    pub fn new(left_table: &str, right_table: &str, join: JoinSpec, destination: &str) -> Self {
        MergeRequest {
            left_table: left_table.to_string(),
            right_table: right_table.to_string(),
            join,
            destination: destination.to_string(),
            selection: ColumnSelection::all(),
        }
    }

    pub fn with_selection(mut self, selection: ColumnSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// Outcome of a completed run, the engine's final status report.
#[derive(Debug)]
pub struct MergeSummary {
    pub destination: String,
    pub records_merged: usize,
    pub stored_columns: usize,
    pub formulas: Vec<FormulaOutcome>,
}

impl MergeSummary {
    pub fn degraded_formulas(&self) -> Vec<&FormulaOutcome> {
        self.formulas.iter().filter(|f| f.is_degraded()).collect()
    }

    pub fn status_line(&self) -> String {
        let mut line = format!(
            "Merged {} record(s) into '{}' ({} stored column(s), {} formula(s))",
            self.records_merged,
            self.destination,
            self.stored_columns,
            self.formulas.len()
        );
        let degraded = self.degraded_formulas();
        if !degraded.is_empty() {
            line.push_str(&format!(
                "; formulas needing manual repair: {}",
                degraded.iter().map(|f| f.column()).join(", ")
            ));
        }
        line
    }
}

/// Assembles one record per left row, in left-row order (left-join
/// semantics): every left row appears exactly once, unmatched rows keep nulls
/// for right-sourced columns, and unmatched right rows are never emitted.
pub fn merge_records(
    left: &RawTable,
    right: &RawTable,
    stored: &[&OutputColumn],
    matcher: &RowMatcher,
) -> Vec<MergedRecord> {
    (0..left.len())
        .map(|row| {
            let matched = matcher.resolve(left, row);
            let mut record = MergedRecord::new();
            for column in stored {
                let value = match column.side {
                    Side::Left => left.value(&column.name, row),
                    Side::Right => matched
                        .map(|right_row| right.value(&column.name, right_row))
                        .unwrap_or(Value::Null),
                };
                record.insert(column.name.clone(), value);
            }
            record
        })
        .collect()
}

fn columns_or_empty<S: DocumentStore + ?Sized>(store: &S, table: &str) -> Vec<ColumnDescriptor> {
    match store.fetch_column_metadata(table) {
        Ok(columns) => columns,
        Err(err) => {
            warn!("Could not fetch columns for '{table}', treating as empty: {err:#}");
            Vec::new()
        }
    }
}

fn data_or_empty<S: DocumentStore + ?Sized>(store: &S, table: &str) -> RawTable {
    match store.fetch_table_data(table) {
        Ok(data) => data,
        Err(err) => {
            warn!("Could not fetch data for '{table}', treating as empty: {err:#}");
            RawTable::default()
        }
    }
}

/// Runs a whole merge against the store, reporting per-batch progress through
/// `report`.
pub fn execute<S: DocumentStore + ?Sized>(
    store: &mut S,
    request: &MergeRequest,
    mut report: impl FnMut(&BatchProgress),
) -> Result<MergeSummary, MergeError> {
    let destination = sanitize_table_name(&request.destination);
    if destination.is_empty() {
        return Err(MergeError::InvalidDestination {
            name: request.destination.clone(),
        });
    }

    info!(
        "Merging '{}' + '{}' into '{destination}' on {:?} (5%)",
        request.left_table, request.right_table, request.join
    );

    let left_columns = normalize_columns(columns_or_empty(store, &request.left_table));
    let right_columns = normalize_columns(columns_or_empty(store, &request.right_table));
    let schema = unify(&left_columns, &right_columns, &request.selection);
    let stored = schema.stored_columns();
    let computed = schema.computed_columns();
    debug!(
        "Unified schema: {} stored, {} computed column(s)",
        stored.len(),
        computed.len()
    );

    let left_data = data_or_empty(store, &request.left_table);
    let right_data = data_or_empty(store, &request.right_table);
    let matcher = RowMatcher::build(&request.join, &right_data);
    let records = merge_records(&left_data, &right_data, &stored, &matcher);

    info!("Creating destination table '{destination}' (15%)");
    batch::create_destination(store, &destination, &stored).map_err(|source| {
        MergeError::SchemaCreation {
            table: destination.clone(),
            source,
        }
    })?;

    let mut next_batch = 0usize;
    let mut run = BatchRun::new(store, &destination, &stored, &records);
    for step in &mut run {
        match step {
            Ok(progress) => {
                debug!(
                    "Inserted batch {} ({}/{} rows, {}%)",
                    progress.batch_index,
                    progress.rows_written,
                    progress.total_rows,
                    progress.percent()
                );
                report(&progress);
                next_batch = progress.batch_index + 1;
            }
            Err(source) => {
                return Err(MergeError::BatchInsert {
                    table: destination.clone(),
                    batch_index: next_batch,
                    source,
                });
            }
        }
    }
    drop(run);

    info!("Recreating formula columns (85%)");
    let formulas = migrate_formulas(store, &destination, &computed);

    let summary = MergeSummary {
        destination,
        records_merged: records.len(),
        stored_columns: stored.len(),
        formulas,
    };
    info!("{} (100%)", summary.status_line());
    Ok(summary)
}
