//! Result rows.

use crate::db::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// How result columns are keyed when rows are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    /// Column name keys.
    #[default]
    Assoc,
    /// Zero-based column index keys.
    Numeric,
    /// Every column twice: index key first, then name key.
    Both,
}

/// Key of a single column within a [`Row`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    Name(String),
    Index(usize),
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// An ordered column-key to value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: Vec<(ColumnKey, Value)>,
}

impl Row {
    /// Build a row from column names and values in driver order.
    pub fn from_columns(columns: &[String], values: Vec<Value>, mode: ResultMode) -> Self {
        let capacity = match mode {
            ResultMode::Both => values.len() * 2,
            _ => values.len(),
        };
        let mut entries = Vec::with_capacity(capacity);
        for (idx, (name, value)) in columns.iter().zip(values).enumerate() {
            match mode {
                ResultMode::Assoc => entries.push((ColumnKey::Name(name.clone()), value)),
                ResultMode::Numeric => entries.push((ColumnKey::Index(idx), value)),
                ResultMode::Both => {
                    entries.push((ColumnKey::Index(idx), value.clone()));
                    entries.push((ColumnKey::Name(name.clone()), value));
                }
            }
        }
        Self { entries }
    }

    /// Look up a column by name.
    ///
    /// With duplicate column names the last one wins, like an associative fetch.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| matches!(key, ColumnKey::Name(n) if n == name))
            .map(|(_, value)| value)
    }

    /// Look up a column by zero-based index key.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| matches!(key, ColumnKey::Index(i) if *i == idx))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnKey, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    /// Convert the row to a JSON object in column order.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

/// Outcome of a single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// The statement produced a result set.
    Rows(Vec<Row>),
    /// The statement changed data; number of affected rows.
    Affected(u64),
}

impl QueryOutput {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected(n) => Some(*n),
        }
    }
}
