//! Core metric types.
//!
//! - [`Value`]: Scalar value scanned from a result column or computed by a sampler
//! - [`Metric`]: One emitted record (measurement, tags, fields, timestamp)
//! - [`MetricKind`]: Whether the record was emitted as plain fields or as a gauge

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag set of a metric: string dimensions used for grouping.
pub type Tags = BTreeMap<String, String>;

/// Field set of a metric: scalar values keyed by column name.
pub type Fields = BTreeMap<String, Value>;

/// A dynamically-typed scalar value.
///
/// Result columns are scanned into one of these variants. Strings are the only
/// kind that can become a tag or a measurement name; every other kind is a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// `bit` columns.
    Bool(bool),
    /// Integer columns (`tinyint` through `bigint`).
    Int(i64),
    /// Floating point and decimal columns.
    Float(f64),
    /// Character columns (and GUIDs, rendered as text).
    String(String),
}

impl Value {
    /// Returns the string slice if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Null | Self::String(_) => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// How a metric was handed to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Untyped fields (`add_fields`).
    Fields,
    /// Point-in-time gauge (`add_gauge`).
    Gauge,
}

/// A single metric record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Measurement (metric family) name.
    pub measurement: String,
    /// String dimensions.
    pub tags: Tags,
    /// Scalar values.
    pub fields: Fields,
    /// Time the record was produced (UTC).
    pub timestamp: DateTime<Utc>,
    /// Emission kind.
    pub kind: MetricKind,
}

impl Metric {
    /// Create a metric of kind [`MetricKind::Fields`].
    pub fn new(
        measurement: impl Into<String>,
        tags: Tags,
        fields: Fields,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp,
            kind: MetricKind::Fields,
        }
    }

    /// Set the emission kind.
    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Render as one InfluxDB line-protocol line (no trailing newline).
    ///
    /// Null fields are omitted. Returns `None` when no field is left, since a
    /// line without fields is not valid line protocol.
    pub fn to_line_protocol(&self) -> Option<String> {
        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::Bool(v) => v.to_string(),
                    Value::Int(v) => format!("{v}i"),
                    Value::Float(v) => v.to_string(),
                    Value::String(v) => format!("\"{}\"", escape_string_field(v)),
                };
                Some(format!("{}={rendered}", escape_key(key, &[',', '=', ' '])))
            })
            .collect();
        if fields.is_empty() {
            return None;
        }

        let mut line = escape_key(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let (key, value) = (
                escape_key(key, &[',', '=', ' ']),
                escape_key(value, &[',', '=', ' ']),
            );
            if key.is_empty() || value.is_empty() {
                continue;
            }
            let _ = write!(line, ",{key}={value}");
        }

        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            let _ = write!(line, " {nanos}");
        }
        Some(line)
    }
}

/// Escape a measurement, tag key, tag value or field key.
///
/// Line breaks and tabs are written as `\n`, `\r` and `\t` so one metric
/// always stays on one line. Trailing backslashes are dropped: they would
/// escape the separator that follows.
fn escape_key(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim_end_matches('\\').chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape the contents of a quoted string field.
fn escape_string_field(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
