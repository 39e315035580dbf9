//! Column classification.
//!
//! A column's role is decided by the kind of its scanned value alone:
//!
//! | Column                      | Value kind          | Role        |
//! |-----------------------------|---------------------|-------------|
//! | `measurement`               | string              | measurement |
//! | any other                   | string              | tag         |
//! | any (incl. `measurement`)   | number, bool, null  | field       |

use crate::metric::{Fields, Tags, Value};

/// Reserved column name that carries the measurement.
pub const MEASUREMENT_COLUMN: &str = "measurement";

/// One scanned row: column names paired with values, in result-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSnapshot {
    cells: Vec<(String, Value)>,
}

impl RowSnapshot {
    /// Pair `columns` with `values` positionally.
    pub fn new(columns: &[String], values: Vec<Value>) -> Self {
        Self {
            cells: columns.iter().cloned().zip(values).collect(),
        }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, v)| (name.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for RowSnapshot {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Result of classifying a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Value of a string `measurement` column, if present.
    pub measurement: Option<String>,
    pub tags: Tags,
    pub fields: Fields,
}

/// Split a row into measurement, tags and fields.
///
/// Never fails and has no side effects.
pub fn classify(row: &RowSnapshot) -> Classification {
    let mut out = Classification::default();
    for (column, value) in row.iter() {
        match value {
            Value::String(s) if column == MEASUREMENT_COLUMN => {
                out.measurement = Some(s.clone());
            }
            Value::String(s) => {
                out.tags.insert(column.to_owned(), s.clone());
            }
            other => {
                out.fields.insert(column.to_owned(), other.clone());
            }
        }
    }
    out
}
