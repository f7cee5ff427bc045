//! In-memory document store.
//!
//! Backs the CLI's JSON document files and the test suites. Formula columns
//! follow the store convention of `$column` references; they are validated
//! when added and evaluated lazily on fetch, so computed values never occupy
//! storage. Comment lines (`#`) are ignored, and a formula body of `None`
//! (the migrator's placeholder shape) evaluates to null.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow, bail};
use evalexpr::{ContextWithMutableVariables, HashMapContext, eval_with_context};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, evalexpr_to_value, value_to_evalexpr},
    schema::{ColumnDescriptor, ColumnType},
    store::{AddColumnSpec, ColumnSpec, DocumentStore, RawTable},
};

fn formula_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid formula reference pattern")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredColumn {
    name: String,
    column_type: ColumnType,
    label: String,
    #[serde(default)]
    is_computed: bool,
    #[serde(default)]
    expression: String,
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTable {
    row_ids: Vec<i64>,
    columns: Vec<StoredColumn>,
}

impl StoredTable {
    fn column(&self, name: &str) -> Option<&StoredColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn next_row_id(&self) -> i64 {
        self.row_ids.iter().max().copied().unwrap_or(0) + 1
    }
}

/// A whole document held in memory, serializable as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    tables: BTreeMap<String, StoredTable>,
}

impl MemoryStore {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening document {path:?}"))?;
        serde_json::from_reader(BufReader::new(file)).context("Parsing document JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating document {path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Writing document JSON")?;
        writer.flush().context("Flushing document JSON")
    }

    fn table(&self, name: &str) -> Result<&StoredTable> {
        self.tables
            .get(name)
            .ok_or_else(|| anyhow!("Table '{name}' does not exist"))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut StoredTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| anyhow!("Table '{name}' does not exist"))
    }
}

fn is_identifier_safe(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strips comment lines and rewrites `$column` references to bare evalexpr
/// identifiers. `None` signals an inert formula that always yields null.
fn effective_expression(expression: &str) -> Option<String> {
    let body = expression
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "None" {
        return None;
    }
    Some(
        formula_reference_pattern()
            .replace_all(trimmed, "$1")
            .into_owned(),
    )
}

fn default_binding(column_type: &ColumnType) -> evalexpr::Value {
    match column_type {
        ColumnType::Number | ColumnType::Int => evalexpr::Value::Int(0),
        ColumnType::Bool => evalexpr::Value::Boolean(false),
        _ => evalexpr::Value::String(String::new()),
    }
}

/// Checks a formula against the table's current columns: every `$reference`
/// must name an existing column and the rewritten expression must evaluate
/// against representative bindings.
fn validate_formula(expression: &str, columns: &[StoredColumn]) -> Result<()> {
    let Some(rewritten) = effective_expression(expression) else {
        return Ok(());
    };
    let body: String = expression
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    for captures in formula_reference_pattern().captures_iter(&body) {
        let reference = &captures[1];
        if !columns.iter().any(|c| c.name == reference) {
            bail!("Formula references unknown column '{reference}'");
        }
    }

    let mut context = HashMapContext::new();
    for column in columns {
        context
            .set_value(column.name.clone().into(), default_binding(&column.column_type))
            .with_context(|| format!("Binding column '{}'", column.name))?;
    }
    eval_with_context(&rewritten, &context)
        .map_err(|err| anyhow!("Formula is not valid here: {err}"))?;
    Ok(())
}

impl DocumentStore for MemoryStore {
    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn fetch_column_metadata(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let table = self.table(table)?;
        Ok(table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| ColumnDescriptor {
                id: idx as i64 + 1,
                name: column.name.clone(),
                column_type: column.column_type.clone(),
                is_computed: column.is_computed,
                expression: column.expression.clone(),
                label: column.label.clone(),
            })
            .collect())
    }

    fn fetch_table_data(&self, table: &str) -> Result<RawTable> {
        let table = self.table(table)?;
        let mut columns: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for column in table.columns.iter().filter(|c| !c.is_computed) {
            columns.insert(column.name.clone(), column.values.clone());
        }

        let computed: Vec<&StoredColumn> =
            table.columns.iter().filter(|c| c.is_computed).collect();
        if !computed.is_empty() {
            let effectives: Vec<Option<String>> = computed
                .iter()
                .map(|c| effective_expression(&c.expression))
                .collect();
            let mut results: Vec<Vec<Value>> = vec![Vec::new(); computed.len()];
            for row in 0..table.row_ids.len() {
                let mut context = HashMapContext::new();
                for column in table.columns.iter().filter(|c| !c.is_computed) {
                    let value = column.values.get(row).cloned().unwrap_or(Value::Null);
                    if !value.is_null() {
                        context
                            .set_value(column.name.clone().into(), value_to_evalexpr(&value))
                            .with_context(|| format!("Binding column '{}'", column.name))?;
                    }
                }
                for (idx, column) in computed.iter().enumerate() {
                    // Evaluation failures (null inputs, type mismatches)
                    // surface as null cells rather than fetch errors.
                    let value = match &effectives[idx] {
                        None => Value::Null,
                        Some(expr) => eval_with_context(expr, &context)
                            .map(evalexpr_to_value)
                            .unwrap_or(Value::Null),
                    };
                    if !value.is_null() {
                        context
                            .set_value(column.name.clone().into(), value_to_evalexpr(&value))
                            .with_context(|| format!("Binding column '{}'", column.name))?;
                    }
                    results[idx].push(value);
                }
            }
            for (column, values) in computed.iter().zip(results) {
                columns.insert(column.name.clone(), values);
            }
        }

        Ok(RawTable {
            row_ids: table.row_ids.clone(),
            columns,
        })
    }

    fn create_table(&mut self, name: &str, columns: &[ColumnSpec]) -> Result<()> {
        if !is_identifier_safe(name) {
            bail!("Table name '{name}' is not identifier-safe");
        }
        if self.tables.contains_key(name) {
            bail!("Table '{name}' already exists");
        }
        let columns = columns
            .iter()
            .map(|spec| StoredColumn {
                name: spec.name.clone(),
                column_type: spec.column_type.clone(),
                label: spec.label.clone(),
                is_computed: false,
                expression: String::new(),
                values: Vec::new(),
            })
            .collect();
        self.tables.insert(
            name.to_string(),
            StoredTable {
                row_ids: Vec::new(),
                columns,
            },
        );
        Ok(())
    }

    fn bulk_insert(
        &mut self,
        table: &str,
        row_count: usize,
        column_values: &BTreeMap<String, Vec<Value>>,
    ) -> Result<()> {
        let stored = self.table_mut(table)?;
        for (name, values) in column_values {
            let column = stored
                .column(name)
                .ok_or_else(|| anyhow!("Table '{table}' has no column '{name}'"))?;
            if column.is_computed {
                bail!("Column '{name}' is computed and cannot receive stored values");
            }
            if values.len() != row_count {
                bail!(
                    "Column '{name}' carries {} value(s) for {row_count} row(s)",
                    values.len()
                );
            }
        }

        let start_id = stored.next_row_id();
        stored
            .row_ids
            .extend((0..row_count as i64).map(|offset| start_id + offset));
        for column in stored.columns.iter_mut().filter(|c| !c.is_computed) {
            match column_values.get(&column.name) {
                Some(values) => column.values.extend(values.iter().cloned()),
                None => column
                    .values
                    .extend(std::iter::repeat_n(Value::Null, row_count)),
            }
        }
        Ok(())
    }

    fn add_column(&mut self, table: &str, name: &str, spec: &AddColumnSpec) -> Result<()> {
        let stored = self.table_mut(table)?;
        if stored.column(name).is_some() {
            bail!("Table '{table}' already has a column '{name}'");
        }
        if spec.is_computed {
            validate_formula(&spec.expression, &stored.columns)
                .with_context(|| format!("Adding formula column '{name}' to '{table}'"))?;
        }
        let row_count = stored.row_ids.len();
        stored.columns.push(StoredColumn {
            name: name.to_string(),
            column_type: spec.column_type.clone(),
            label: name.to_string(),
            is_computed: spec.is_computed,
            expression: spec.expression.clone(),
            values: if spec.is_computed {
                Vec::new()
            } else {
                vec![Value::Null; row_count]
            },
        });
        Ok(())
    }
}
