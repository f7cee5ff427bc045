mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use table_merger::{data::Value, memory::MemoryStore, store::DocumentStore};
use tempfile::tempdir;

use common::orders_and_customers;

fn write_doc(store: &MemoryStore) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("doc.json");
    store.save(&path).expect("save document");
    (dir, path)
}

#[test]
fn tables_lists_user_tables() {
    let (_dir, doc) = write_doc(&orders_and_customers());
    Command::cargo_bin("table-merger")
        .expect("binary exists")
        .args(["tables", "--doc", doc.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Orders").and(contains("Customers")));
}

#[test]
fn columns_describes_one_table() {
    let (_dir, doc) = write_doc(&orders_and_customers());
    Command::cargo_bin("table-merger")
        .expect("binary exists")
        .args(["columns", "--doc", doc.to_str().unwrap(), "--table", "Customers"])
        .assert()
        .success()
        .stdout(contains("customer").and(contains("city")));
}

#[test]
fn merge_writes_the_combined_table_back_to_the_document() {
    let (_dir, doc) = write_doc(&orders_and_customers());
    Command::cargo_bin("table-merger")
        .expect("binary exists")
        .args([
            "merge",
            "--doc",
            doc.to_str().unwrap(),
            "--left",
            "Orders",
            "--right",
            "Customers",
            "--link",
            "common:customer",
        ])
        .assert()
        .success()
        .stdout(contains("Merged 2 record(s) into 'Orders_Customers_Merged'"));

    let store = MemoryStore::load(&doc).expect("reload document");
    let merged = store
        .fetch_table_data("Orders_Customers_Merged")
        .expect("merged table exists");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.value("city", 0), Value::Text("NYC".to_string()));
    assert_eq!(merged.value("city", 1), Value::Null);
}

#[test]
fn merge_rejects_a_malformed_link_spec() {
    let (_dir, doc) = write_doc(&orders_and_customers());
    Command::cargo_bin("table-merger")
        .expect("binary exists")
        .args([
            "merge",
            "--doc",
            doc.to_str().unwrap(),
            "--left",
            "Orders",
            "--right",
            "Customers",
            "--link",
            "customer",
        ])
        .assert()
        .failure()
        .stderr(contains("Link column"));
}
