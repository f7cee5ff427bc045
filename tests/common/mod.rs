#![allow(dead_code)]

use std::collections::BTreeMap;

use table_merger::{
    data::Value,
    memory::MemoryStore,
    schema::ColumnType,
    store::{ColumnSpec, DocumentStore},
};

/// Builds a table through the public store API.
pub fn seed_table(
    store: &mut MemoryStore,
    name: &str,
    columns: &[(&str, ColumnType)],
    rows: Vec<Vec<Value>>,
) {
    let specs: Vec<ColumnSpec> = columns
        .iter()
        .map(|(name, column_type)| ColumnSpec {
            name: name.to_string(),
            column_type: column_type.clone(),
            label: name.to_string(),
        })
        .collect();
    store.create_table(name, &specs).expect("create table");

    let row_count = rows.len();
    if row_count == 0 {
        return;
    }
    let mut values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (idx, (column, _)) in columns.iter().enumerate() {
        values.insert(
            column.to_string(),
            rows.iter().map(|row| row[idx].clone()).collect(),
        );
    }
    store
        .bulk_insert(name, row_count, &values)
        .expect("insert rows");
}

/// A document with the Orders/Customers pair joined by a shared `customer`
/// column: Bob has no matching customer row.
pub fn orders_and_customers() -> MemoryStore {
    let mut store = MemoryStore::default();
    seed_table(
        &mut store,
        "Orders",
        &[
            ("customer", ColumnType::Text),
            ("amount", ColumnType::Number),
        ],
        vec![
            vec!["Alice".into(), Value::Number(10.0)],
            vec!["Bob".into(), Value::Number(20.0)],
        ],
    );
    seed_table(
        &mut store,
        "Customers",
        &[("customer", ColumnType::Text), ("city", ColumnType::Text)],
        vec![vec!["Alice".into(), "NYC".into()]],
    );
    store
}
