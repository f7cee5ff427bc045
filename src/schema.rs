//! Column metadata model and the schema normalizer.
//!
//! Raw column descriptors arrive from the document store with the store's own
//! type tokens and a sprinkling of system columns. Normalization prepares one
//! table's descriptors for unification: system columns are dropped and
//! non-portable types are coerced to representations the destination table
//! can hold without reusing the source's relationship graph.

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix used by store-managed helper columns attached to user tables.
pub const HELPER_COLUMN_PREFIX: &str = "gristHelper_";
/// The store's hidden manual-ordering column.
pub const MANUAL_SORT_COLUMN: &str = "manualSort";
/// The synthetic row-identifier column present in every fetched table.
pub const ROW_ID_COLUMN: &str = "id";

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(Ref|RefList):(.+)$").expect("valid reference pattern"))
}

/// Declared column type, parsed from the store's type token.
///
/// Unknown tokens round-trip through [`ColumnType::Other`] untouched so the
/// engine never fails on a type it does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
    Int,
    Bool,
    Date,
    Choice,
    Any,
    Reference(String),
    ReferenceList(String),
    Other(String),
}

impl ColumnType {
    /// Store type token for this type, suitable for table creation and
    /// column addition requests.
    pub fn storage_token(&self) -> String {
        match self {
            ColumnType::Text => "Text".to_string(),
            ColumnType::Number => "Numeric".to_string(),
            ColumnType::Int => "Int".to_string(),
            ColumnType::Bool => "Bool".to_string(),
            ColumnType::Date => "Date".to_string(),
            ColumnType::Choice => "Choice".to_string(),
            ColumnType::Any => "Any".to_string(),
            ColumnType::Reference(target) => format!("Ref:{target}"),
            ColumnType::ReferenceList(target) => format!("RefList:{target}"),
            ColumnType::Other(token) => token.clone(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ColumnType::Reference(_) | ColumnType::ReferenceList(_))
    }

    /// Target table of a reference type, if any.
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            ColumnType::Reference(target) | ColumnType::ReferenceList(target) => Some(target),
            _ => None,
        }
    }
}

impl FromStr for ColumnType {
    type Err = std::convert::Infallible;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let trimmed = token.trim();
        if let Some(captures) = reference_pattern().captures(trimmed) {
            let target = captures[2].to_string();
            return Ok(if &captures[1] == "Ref" {
                ColumnType::Reference(target)
            } else {
                ColumnType::ReferenceList(target)
            });
        }
        Ok(match trimmed {
            "Text" => ColumnType::Text,
            "Numeric" => ColumnType::Number,
            "Int" => ColumnType::Int,
            "Bool" => ColumnType::Bool,
            "Date" => ColumnType::Date,
            "Choice" => ColumnType::Choice,
            "Any" => ColumnType::Any,
            other => ColumnType::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_token())
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.storage_token())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        match token.parse() {
            Ok(column_type) => Ok(column_type),
            Err(never) => match never {},
        }
    }
}

/// One column's metadata as fetched from the store.
///
/// `name` is the join/merge key across tables; `id` only correlates the
/// descriptor with raw table data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDescriptor {
    pub id: i64,
    pub name: String,
    pub column_type: ColumnType,
    pub is_computed: bool,
    #[serde(default)]
    pub expression: String,
    pub label: String,
}

impl ColumnDescriptor {
    pub fn stored(name: &str, column_type: ColumnType) -> Self {
        ColumnDescriptor {
            id: 0,
            name: name.to_string(),
            column_type,
            is_computed: false,
            expression: String::new(),
            label: name.to_string(),
        }
    }

    pub fn computed(name: &str, column_type: ColumnType, expression: &str) -> Self {
        ColumnDescriptor {
            id: 0,
            name: name.to_string(),
            column_type,
            is_computed: true,
            expression: expression.to_string(),
            label: name.to_string(),
        }
    }
}

/// True for columns the store manages internally; these never participate in
/// a merge.
pub fn is_system_column(name: &str) -> bool {
    name.starts_with(HELPER_COLUMN_PREFIX) || name == MANUAL_SORT_COLUMN
}

/// Coerces a declared type to its portable equivalent for the destination
/// table. References always become plain integers carrying the old row ids,
/// since the destination does not reuse the source's relationship graph.
pub fn portable_type(column_type: &ColumnType) -> ColumnType {
    match column_type {
        ColumnType::Reference(_) | ColumnType::ReferenceList(_) => ColumnType::Int,
        other => other.clone(),
    }
}

/// Prepares one table's raw descriptors for unification: drops system columns
/// and the row-identifier column, then coerces declared types.
///
/// Reference types are always mapped to `Int`; the untyped `Any` is widened to
/// `Text` for stored columns only, so computed columns migrate with their
/// original declared type intact. Unknown types pass through unchanged.
pub fn normalize_columns(columns: Vec<ColumnDescriptor>) -> Vec<ColumnDescriptor> {
    columns
        .into_iter()
        .filter(|column| !is_system_column(&column.name) && column.name != ROW_ID_COLUMN)
        .map(|mut column| {
            column.column_type = portable_type(&column.column_type);
            if !column.is_computed && column.column_type == ColumnType::Any {
                column.column_type = ColumnType::Text;
            }
            column
        })
        .collect()
}
