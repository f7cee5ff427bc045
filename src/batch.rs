//! Batch materialization of merged records into the destination table.
//!
//! Destination creation carries only the stored columns; computed columns are
//! added afterwards by the formula migrator. Inserts run in fixed-size,
//! order-preserving batches, one request at a time, so destination row order
//! always matches left-table row order.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::{
    data::Value,
    merge::MergedRecord,
    store::{ColumnSpec, DocumentStore},
    unify::OutputColumn,
};

/// Rows per bulk-insert request.
pub const BATCH_SIZE: usize = 100;

// The insert phase owns the 50-80% slice of the run's progress scale.
const INSERT_BAND_START: u32 = 50;
const INSERT_BAND_WIDTH: u32 = 30;

/// Progress snapshot emitted after each applied batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch_index: usize,
    pub rows_written: usize,
    pub total_rows: usize,
}

impl BatchProgress {
    /// Overall-run percentage, scaled into the insert phase's reserved band.
    pub fn percent(&self) -> u8 {
        if self.total_rows == 0 {
            return (INSERT_BAND_START + INSERT_BAND_WIDTH) as u8;
        }
        let scaled =
            (INSERT_BAND_WIDTH as f64 * self.rows_written as f64 / self.total_rows as f64).round();
        (INSERT_BAND_START + scaled as u32) as u8
    }
}

/// Creates the destination table with exactly the stored output columns.
pub fn create_destination<S: DocumentStore + ?Sized>(
    store: &mut S,
    table: &str,
    stored: &[&OutputColumn],
) -> Result<()> {
    let specs: Vec<ColumnSpec> = stored
        .iter()
        .map(|column| ColumnSpec {
            name: column.name.clone(),
            column_type: column.column_type.clone(),
            label: column.label.clone(),
        })
        .collect();
    store.create_table(table, &specs)
}

/// Lazy sequence of per-batch insert results.
///
/// Each `next()` issues exactly one bulk-insert request and yields the
/// progress reached, so the consumer controls pacing and reporting. A failed
/// batch ends the run; remaining batches are never attempted and previously
/// inserted rows stay in place.
pub struct BatchRun<'a, S: DocumentStore + ?Sized> {
    store: &'a mut S,
    table: &'a str,
    column_names: Vec<String>,
    records: &'a [MergedRecord],
    cursor: usize,
    batch_index: usize,
    failed: bool,
}

impl<'a, S: DocumentStore + ?Sized> BatchRun<'a, S> {
    pub fn new(
        store: &'a mut S,
        table: &'a str,
        stored: &[&OutputColumn],
        records: &'a [MergedRecord],
    ) -> Self {
        BatchRun {
            store,
            table,
            column_names: stored.iter().map(|c| c.name.clone()).collect(),
            records,
            cursor: 0,
            batch_index: 0,
            failed: false,
        }
    }
}

impl<S: DocumentStore + ?Sized> Iterator for BatchRun<'_, S> {
    type Item = Result<BatchProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.records.len() {
            return None;
        }
        let end = (self.cursor + BATCH_SIZE).min(self.records.len());
        let batch = &self.records[self.cursor..end];

        let mut column_values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for name in &self.column_names {
            let values = batch
                .iter()
                .map(|record| record.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            column_values.insert(name.clone(), values);
        }

        if let Err(err) = self
            .store
            .bulk_insert(self.table, batch.len(), &column_values)
        {
            self.failed = true;
            return Some(Err(err));
        }

        self.cursor = end;
        let progress = BatchProgress {
            batch_index: self.batch_index,
            rows_written: self.cursor,
            total_rows: self.records.len(),
        };
        self.batch_index += 1;
        Some(Ok(progress))
    }
}
