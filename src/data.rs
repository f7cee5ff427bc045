use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell value as stored in a document-store table.
///
/// The store's cells are untyped scalars; this closed sum keeps the coercion
/// and matching rules exhaustive. Missing cells always surface as [`Value::Null`],
/// never as an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interprets the value as a row identifier. Only whole numbers qualify;
    /// reference columns carry row ids as plain numbers on the wire.
    pub fn row_id(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Renders the value for display and for shared-column keys. `2` and
    /// `2.0` produce the same rendering; the matcher pairs it with the
    /// value's type so equal renderings of different types stay distinct.
    pub fn as_key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

pub fn value_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Null => evalexpr::Value::Empty,
        Value::Bool(b) => evalexpr::Value::Boolean(*b),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() {
                evalexpr::Value::Int(*n as i64)
            } else {
                evalexpr::Value::Float(*n)
            }
        }
        Value::Text(s) => evalexpr::Value::String(s.clone()),
    }
}

pub fn evalexpr_to_value(value: evalexpr::Value) -> Value {
    match value {
        evalexpr::Value::Empty => Value::Null,
        evalexpr::Value::Boolean(b) => Value::Bool(b),
        evalexpr::Value::Int(i) => Value::Number(i as f64),
        evalexpr::Value::Float(f) => Value::Number(f),
        evalexpr::Value::String(s) => Value::Text(s),
        evalexpr::Value::Tuple(values) => Value::Text(
            values
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("|"),
        ),
    }
}

/// Sanitizes a user-supplied destination table name to the identifier-safe
/// character set accepted by the store.
pub fn sanitize_table_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Default destination name offered when the caller does not supply one.
pub fn default_destination_name(left: &str, right: &str) -> String {
    format!("{left}_{right}_Merged")
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalexpr::Value as EvalValue;

    #[test]
    fn row_id_accepts_whole_numbers_only() {
        assert_eq!(Value::Number(7.0).row_id(), Some(7));
        assert_eq!(Value::Number(7.5).row_id(), None);
        assert_eq!(Value::Text("7".to_string()).row_id(), None);
        assert_eq!(Value::Null.row_id(), None);
    }

    #[test]
    fn as_key_collapses_integral_floats() {
        assert_eq!(Value::Number(2.0).as_key(), "2");
        assert_eq!(Value::Number(2.5).as_key(), "2.5");
        assert_eq!(Value::Text("Alice".to_string()).as_key(), "Alice");
        assert_eq!(Value::Null.as_key(), "");
    }

    #[test]
    fn sanitize_table_name_replaces_unsafe_characters() {
        assert_eq!(sanitize_table_name("Orders 2024!"), "Orders_2024_");
        assert_eq!(sanitize_table_name("  Plain_Name  "), "Plain_Name");
        assert_eq!(sanitize_table_name(" .-"), "__");
    }

    #[test]
    fn default_destination_name_concatenates_sources() {
        assert_eq!(
            default_destination_name("Orders", "Customers"),
            "Orders_Customers_Merged"
        );
    }

    #[test]
    fn value_round_trips_through_evalexpr() {
        assert_eq!(value_to_evalexpr(&Value::Number(42.0)), EvalValue::Int(42));
        assert_eq!(
            evalexpr_to_value(EvalValue::String("x".to_string())),
            Value::Text("x".to_string())
        );
        assert_eq!(evalexpr_to_value(EvalValue::Empty), Value::Null);
    }

    #[test]
    fn value_serializes_as_plain_json_scalars() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&Value::Text("a".to_string())).unwrap(),
            "\"a\""
        );
        let back: Value = serde_json::from_str("3").unwrap();
        assert_eq!(back, Value::Number(3.0));
    }
}
