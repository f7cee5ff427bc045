//! The document-store boundary.
//!
//! Everything the merge engine needs from the host store is expressed through
//! [`DocumentStore`]. The engine issues one request at a time and awaits its
//! completion before the next, so implementations never see concurrent calls
//! from a single merge run.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    schema::{ColumnDescriptor, ColumnType},
};

/// Prefix of the store's internal bookkeeping tables.
pub const SYSTEM_TABLE_PREFIX: &str = "_grist_";
/// Prefix of tables the store hides from the document's table list.
pub const HIDDEN_TABLE_PREFIX: &str = "GristHidden";

/// True for tables the store manages internally; callers filter these out of
/// any user-facing table list.
pub fn is_system_table(name: &str) -> bool {
    name.starts_with(SYSTEM_TABLE_PREFIX) || name.starts_with(HIDDEN_TABLE_PREFIX)
}

/// Raw table data in the store's columnar wire shape: one ordered row-id
/// vector plus per-column value vectors of the same length.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTable {
    pub row_ids: Vec<i64>,
    pub columns: BTreeMap<String, Vec<Value>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Cell accessor. A column absent from the payload yields `Null` for
    /// every row, never an error.
    pub fn value(&self, column: &str, row: usize) -> Value {
        self.columns
            .get(column)
            .and_then(|values| values.get(row))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|values| values.as_slice())
    }
}

/// Column definition used when creating the destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub label: String,
}

/// Column definition used when adding a single column to an existing table.
#[derive(Debug, Clone, PartialEq)]
pub struct AddColumnSpec {
    pub column_type: ColumnType,
    pub is_computed: bool,
    pub expression: String,
}

/// Host document store, as seen by the merge engine.
pub trait DocumentStore {
    /// All table names in the document, system tables included; use
    /// [`user_tables`] for the filtered view.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Column metadata for one table, system columns included; the schema
    /// normalizer filters by naming convention.
    fn fetch_column_metadata(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    fn fetch_table_data(&self, table: &str) -> Result<RawTable>;

    /// Creates a table with the given stored columns. Fails when `name`
    /// already exists or is not identifier-safe.
    fn create_table(&mut self, name: &str, columns: &[ColumnSpec]) -> Result<()>;

    /// Appends `row_count` rows in one request; the store assigns row ids.
    /// Every value vector must hold exactly `row_count` entries.
    fn bulk_insert(
        &mut self,
        table: &str,
        row_count: usize,
        column_values: &BTreeMap<String, Vec<Value>>,
    ) -> Result<()>;

    /// Adds one column to an existing table. Fails when the expression is not
    /// valid in the destination context.
    fn add_column(&mut self, table: &str, name: &str, spec: &AddColumnSpec) -> Result<()>;
}

/// Lists the document's tables with the store's internal tables filtered out.
pub fn user_tables<S: DocumentStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    Ok(store
        .list_tables()?
        .into_iter()
        .filter(|name| !is_system_table(name))
        .collect())
}
