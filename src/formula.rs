//! Formula migration onto the destination table.
//!
//! Computed columns carry their expression text verbatim; the engine makes no
//! attempt to translate the store's formula language. When the destination
//! rejects a definition the column is recreated as an inert placeholder that
//! evaluates to null and embeds the original expression for manual repair, so
//! every intended computed column exists after the run.

use log::{error, warn};

use crate::{
    schema::ColumnType,
    store::{AddColumnSpec, DocumentStore},
    unify::OutputColumn,
};

/// Per-column migration result. Degradation is contained here and never
/// escalates to a merge-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaOutcome {
    Migrated { column: String },
    Degraded { column: String, reason: String },
}

impl FormulaOutcome {
    pub fn column(&self) -> &str {
        match self {
            FormulaOutcome::Migrated { column } | FormulaOutcome::Degraded { column, .. } => column,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FormulaOutcome::Degraded { .. })
    }
}

/// Inert replacement for an expression the destination rejected: comment
/// lines preserve the original text and the trailing `None` evaluates to an
/// empty result.
pub fn placeholder_expression(original: &str) -> String {
    format!("# TODO: adapt this formula for the merged table\n# Original: {original}\nNone")
}

/// Recreates every computed column on the destination table, falling back to
/// a placeholder when the verbatim definition is rejected.
pub fn migrate_formulas<S: DocumentStore + ?Sized>(
    store: &mut S,
    table: &str,
    computed: &[&OutputColumn],
) -> Vec<FormulaOutcome> {
    computed
        .iter()
        .map(|column| migrate_one(store, table, column))
        .collect()
}

fn migrate_one<S: DocumentStore + ?Sized>(
    store: &mut S,
    table: &str,
    column: &OutputColumn,
) -> FormulaOutcome {
    let verbatim = AddColumnSpec {
        column_type: column.column_type.clone(),
        is_computed: true,
        expression: column.expression.clone(),
    };
    let rejection = match store.add_column(table, &column.name, &verbatim) {
        Ok(()) => {
            return FormulaOutcome::Migrated {
                column: column.name.clone(),
            };
        }
        Err(err) => err,
    };
    warn!(
        "Formula column '{}' was rejected by '{table}', creating placeholder: {rejection:#}",
        column.name
    );

    let fallback = AddColumnSpec {
        column_type: ColumnType::Any,
        is_computed: true,
        expression: placeholder_expression(&column.expression),
    };
    match store.add_column(table, &column.name, &fallback) {
        Ok(()) => FormulaOutcome::Degraded {
            column: column.name.clone(),
            reason: format!("{rejection:#}"),
        },
        Err(second) => {
            error!(
                "Placeholder for formula column '{}' also failed: {second:#}",
                column.name
            );
            FormulaOutcome::Degraded {
                column: column.name.clone(),
                reason: format!("{rejection:#}; placeholder also failed: {second:#}"),
            }
        }
    }
}
