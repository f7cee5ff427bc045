//! Link resolution: correlating each left-hand row with at most one
//! right-hand row.
//!
//! The matcher indexes the right-hand table once, then answers per-row probes
//! in constant time. When several right rows share a join key only the first
//! (in right-table row order) is reachable; the merge is one-to-one by
//! construction, never one-to-many.

use std::collections::HashMap;
use std::mem::{Discriminant, discriminant};

use crate::{data::Value, store::RawTable};

/// The caller's chosen join strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinSpec {
    /// Equality on a column present in both tables; values match when both
    /// the type and the rendered value agree, so `2` and `2.0` unify but
    /// text never matches a number.
    SharedColumn(String),
    /// A left-hand reference column whose values are right-hand row ids.
    ReferenceColumn { column: String, target: String },
}

impl JoinSpec {
    /// The left-table column driving the join.
    pub fn column(&self) -> &str {
        match self {
            JoinSpec::SharedColumn(name) => name,
            JoinSpec::ReferenceColumn { column, .. } => column,
        }
    }
}

// Keys pair the variant with the rendering so cross-type rows never match.
type SharedKey = (Discriminant<Value>, String);

enum Probe {
    ByRowId(HashMap<i64, usize>),
    ByKey(HashMap<SharedKey, usize>),
}

fn shared_key(value: &Value) -> SharedKey {
    (discriminant(value), value.as_key())
}

/// Per-run match function from left row index to an optional right row index.
pub struct RowMatcher {
    column: String,
    probe: Probe,
}

impl RowMatcher {
    /// Indexes the right table for the chosen join strategy.
    pub fn build(spec: &JoinSpec, right: &RawTable) -> Self {
        let probe = match spec {
            JoinSpec::ReferenceColumn { .. } => {
                let mut index = HashMap::with_capacity(right.len());
                for (row, id) in right.row_ids.iter().enumerate() {
                    index.entry(*id).or_insert(row);
                }
                Probe::ByRowId(index)
            }
            JoinSpec::SharedColumn(name) => {
                let mut index = HashMap::with_capacity(right.len());
                for row in 0..right.len() {
                    let value = right.value(name, row);
                    if value.is_null() {
                        continue;
                    }
                    // First right-hand row with a key wins; later duplicates
                    // are unreachable.
                    index.entry(shared_key(&value)).or_insert(row);
                }
                Probe::ByKey(index)
            }
        };
        RowMatcher {
            column: spec.column().to_string(),
            probe,
        }
    }

    /// Looks up the matching right row for one left row. A null join value or
    /// an absent key yields no match, which is not an error.
    pub fn resolve(&self, left: &RawTable, row: usize) -> Option<usize> {
        let value = left.value(&self.column, row);
        if value.is_null() {
            return None;
        }
        match &self.probe {
            Probe::ByRowId(index) => index.get(&value.row_id()?).copied(),
            Probe::ByKey(index) => index.get(&shared_key(&value)).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn table(row_ids: Vec<i64>, columns: Vec<(&str, Vec<Value>)>) -> RawTable {
        RawTable {
            row_ids,
            columns: columns
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
        }
    }

    #[test]
    fn shared_column_matches_first_duplicate_only() {
        let right = table(
            vec![1, 2, 3],
            vec![("customer", vec!["Alice".into(), "Alice".into(), "Bob".into()])],
        );
        let left = table(vec![10], vec![("customer", vec!["Alice".into()])]);

        let matcher = RowMatcher::build(&JoinSpec::SharedColumn("customer".to_string()), &right);
        assert_eq!(matcher.resolve(&left, 0), Some(0));
    }

    #[test]
    fn shared_column_null_or_unknown_key_yields_no_match() {
        let right = table(vec![1], vec![("customer", vec!["Alice".into()])]);
        let left = table(
            vec![10, 11],
            vec![("customer", vec![Value::Null, "Carol".into()])],
        );

        let matcher = RowMatcher::build(&JoinSpec::SharedColumn("customer".to_string()), &right);
        assert_eq!(matcher.resolve(&left, 0), None);
        assert_eq!(matcher.resolve(&left, 1), None);
    }

    #[test]
    fn shared_column_never_matches_across_types() {
        let right = table(
            vec![1, 2],
            vec![(
                "code",
                vec![Value::Text("2".to_string()), Value::Bool(true)],
            )],
        );
        let left = table(
            vec![10, 11],
            vec![(
                "code",
                vec![Value::Number(2.0), Value::Text("true".to_string())],
            )],
        );

        let matcher = RowMatcher::build(&JoinSpec::SharedColumn("code".to_string()), &right);
        assert_eq!(matcher.resolve(&left, 0), None);
        assert_eq!(matcher.resolve(&left, 1), None);
    }

    #[test]
    fn shared_column_matches_numbers_by_value() {
        let right = table(vec![1], vec![("code", vec![Value::Number(2.0)])]);
        let left = table(vec![10], vec![("code", vec![Value::Number(2.0)])]);

        let matcher = RowMatcher::build(&JoinSpec::SharedColumn("code".to_string()), &right);
        assert_eq!(matcher.resolve(&left, 0), Some(0));
    }

    #[test]
    fn reference_column_matches_strictly_by_row_id() {
        // Row id 8 carries the same payload as row id 7; only identifier
        // equality may match.
        let right = table(
            vec![7, 8],
            vec![("city", vec!["NYC".into(), "NYC".into()])],
        );
        let left = table(vec![1], vec![("linkCol", vec![Value::Number(7.0)])]);

        let spec = JoinSpec::ReferenceColumn {
            column: "linkCol".to_string(),
            target: "Customers".to_string(),
        };
        let matcher = RowMatcher::build(&spec, &right);
        assert_eq!(matcher.resolve(&left, 0), Some(0));
    }

    #[test]
    fn reference_column_rejects_missing_and_non_integer_ids() {
        let right = table(vec![7], vec![("city", vec!["NYC".into()])]);
        let left = table(
            vec![1, 2, 3],
            vec![(
                "linkCol",
                vec![Value::Number(9.0), Value::Null, Value::Text("7".to_string())],
            )],
        );

        let spec = JoinSpec::ReferenceColumn {
            column: "linkCol".to_string(),
            target: "Customers".to_string(),
        };
        let matcher = RowMatcher::build(&spec, &right);
        assert_eq!(matcher.resolve(&left, 0), None);
        assert_eq!(matcher.resolve(&left, 1), None);
        assert_eq!(matcher.resolve(&left, 2), None);
    }

    #[test]
    fn missing_join_column_never_matches() {
        let right = table(vec![1], vec![("customer", vec!["Alice".into()])]);
        let left = table(vec![10], vec![("amount", vec![Value::Number(1.0)])]);

        let matcher = RowMatcher::build(&JoinSpec::SharedColumn("customer".to_string()), &right);
        assert_eq!(matcher.resolve(&left, 0), None);
    }
}
