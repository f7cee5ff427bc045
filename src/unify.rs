//! Column unification across the two source schemas.
//!
//! The output schema is left-table order first, then every right-table column
//! whose name has not been emitted yet. First occurrence wins: a right-hand
//! column colliding with an already-emitted name is silently dropped, never
//! renamed. The shared join column deduplicates naturally under this rule.

use std::collections::{BTreeSet, HashSet};

use crate::schema::{ColumnDescriptor, ColumnType};

/// Which source table an output column draws its stored values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One column of the unified output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub label: String,
    pub column_type: ColumnType,
    pub side: Side,
    pub is_computed: bool,
    pub expression: String,
}

impl OutputColumn {
    fn from_descriptor(descriptor: &ColumnDescriptor, side: Side) -> Self {
        OutputColumn {
            name: descriptor.name.clone(),
            label: if descriptor.label.is_empty() {
                descriptor.name.clone()
            } else {
                descriptor.label.clone()
            },
            column_type: descriptor.column_type.clone(),
            side,
            is_computed: descriptor.is_computed,
            expression: descriptor.expression.clone(),
        }
    }
}

/// The caller's per-side column picks. `None` selects every column, matching
/// the original widget's default of all checkboxes ticked.
#[derive(Debug, Clone, Default)]
pub struct ColumnSelection {
    left: Option<BTreeSet<String>>,
    right: Option<BTreeSet<String>>,
}

impl ColumnSelection {
    pub fn all() -> Self {
        ColumnSelection::default()
    }

    pub fn with_left<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.left = Some(names.into_iter().collect());
        self
    }

    pub fn with_right<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.right = Some(names.into_iter().collect());
        self
    }

    pub fn includes(&self, side: Side, name: &str) -> bool {
        let picks = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        picks.as_ref().is_none_or(|set| set.contains(name))
    }
}

/// The merged output schema: pairwise-distinct names, row identifier always
/// excluded, left-table order before right-table order.
#[derive(Debug, Clone, Default)]
pub struct UnifiedSchema {
    pub columns: Vec<OutputColumn>,
}

impl UnifiedSchema {
    /// Columns whose values are persisted literally; these alone participate
    /// in destination-table creation and bulk insertion.
    pub fn stored_columns(&self) -> Vec<&OutputColumn> {
        self.columns.iter().filter(|c| !c.is_computed).collect()
    }

    /// Columns derived by store-evaluated expressions, recreated after the
    /// data pass by the formula migrator.
    pub fn computed_columns(&self) -> Vec<&OutputColumn> {
        self.columns.iter().filter(|c| c.is_computed).collect()
    }
}

/// Merges two normalized descriptor sequences into one output schema,
/// honoring the caller's column selection.
pub fn unify(
    left: &[ColumnDescriptor],
    right: &[ColumnDescriptor],
    selection: &ColumnSelection,
) -> UnifiedSchema {
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut columns = Vec::with_capacity(left.len() + right.len());

    for descriptor in left {
        if !selection.includes(Side::Left, &descriptor.name) {
            continue;
        }
        if emitted.insert(descriptor.name.as_str()) {
            columns.push(OutputColumn::from_descriptor(descriptor, Side::Left));
        }
    }
    for descriptor in right {
        if !selection.includes(Side::Right, &descriptor.name) {
            continue;
        }
        if emitted.insert(descriptor.name.as_str()) {
            columns.push(OutputColumn::from_descriptor(descriptor, Side::Right));
        }
    }

    UnifiedSchema { columns }
}
