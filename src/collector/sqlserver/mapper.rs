//! Row to metric mapping.

use chrono::Utc;

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::collector::sqlserver::{MEASUREMENT_COLUMN, Query, RowSnapshot, Scanner, classify};
use crate::metric::{Fields, Metric, Value};

/// Field carried by per-row results.
pub const VALUE_FIELD: &str = "value";

/// Where aggregated rows get their measurement name.
///
/// Per-row results always take it from the `measurement` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementNaming {
    /// The `measurement` column, or `default` when it is absent or empty.
    Column { default: String },
    /// Always this name; the `measurement` column is ignored.
    Fixed(String),
}

impl MeasurementNaming {
    fn resolve(&self, classified: Option<String>) -> String {
        match self {
            Self::Column { default } => classified
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| default.clone()),
            Self::Fixed(name) => name.clone(),
        }
    }
}

/// Scan one row and build its metric.
///
/// # Errors
/// - [`CollectorError::Scan`] if the row does not fit the query's columns.
/// - [`CollectorError::MissingField`] if a per-row result has no string
///   `measurement` or no non-string `value` column.
pub fn map_row(
    query: &Query,
    naming: &MeasurementNaming,
    row: &dyn Scanner,
) -> Result<Metric, CollectorError> {
    let mut values = vec![Value::Null; query.ordered_columns.len()];
    row.scan(&mut values)?;

    let snapshot = RowSnapshot::new(&query.ordered_columns, values);
    let mut classified = classify(&snapshot);
    let now = Utc::now();

    if query.result_by_row {
        let measurement = classified
            .measurement
            .filter(|m| !m.is_empty())
            .ok_or_else(|| missing(query, MEASUREMENT_COLUMN))?;
        let value = classified
            .fields
            .remove(VALUE_FIELD)
            .ok_or_else(|| missing(query, VALUE_FIELD))?;

        let mut fields = Fields::new();
        fields.insert(VALUE_FIELD.to_owned(), value);
        Ok(Metric::new(measurement, classified.tags, fields, now))
    } else {
        let measurement = naming.resolve(classified.measurement);
        Ok(Metric::new(
            measurement,
            classified.tags,
            classified.fields,
            now,
        ))
    }
}

/// Map one row and hand the result to the accumulator.
pub fn accumulate_row(
    query: &Query,
    naming: &MeasurementNaming,
    row: &dyn Scanner,
    acc: &dyn Accumulator,
) -> Result<(), CollectorError> {
    let metric = map_row(query, naming, row)?;
    acc.add_fields(&metric.measurement, metric.fields, metric.tags, metric.timestamp);
    Ok(())
}

fn missing(query: &Query, field: &str) -> CollectorError {
    CollectorError::MissingField {
        script: query.script_name.clone(),
        field: field.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;

    fn query(columns: &[&str], result_by_row: bool) -> Query {
        let mut q = Query::new("test", "SELECT 1", result_by_row);
        q.ordered_columns = columns.iter().map(|c| c.to_string()).collect();
        q
    }

    fn column_naming() -> MeasurementNaming {
        MeasurementNaming::Column {
            default: "custom_mssql".into(),
        }
    }

    #[test]
    fn test_aggregated_row() {
        let q = query(&["measurement", "free", "device", "used"], false);
        let row = vec![
            Value::from("disk"),
            Value::Int(100),
            Value::from("sda"),
            Value::Float(1.5),
        ];
        let m = map_row(&q, &column_naming(), &row).unwrap();
        assert_eq!(m.measurement, "disk");
        assert_eq!(m.tag("device"), Some("sda"));
        assert_eq!(m.fields.len(), 2);
        assert_eq!(m.field("free"), Some(&Value::Int(100)));
        assert_eq!(m.field("used"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_aggregated_row_default_measurement() {
        let q = query(&["db", "size"], false);
        let row = vec![Value::from("master"), Value::Int(4)];
        let m = map_row(&q, &column_naming(), &row).unwrap();
        assert_eq!(m.measurement, "custom_mssql");

        let q = query(&["measurement", "size"], false);
        let row = vec![Value::from(""), Value::Int(4)];
        let m = map_row(&q, &column_naming(), &row).unwrap();
        assert_eq!(m.measurement, "custom_mssql");
    }

    #[test]
    fn test_aggregated_row_fixed_measurement() {
        let q = query(&["measurement", "size"], false);
        let row = vec![Value::from("disk"), Value::Int(4)];
        let naming = MeasurementNaming::Fixed("nhn_rds_mssql".into());
        let m = map_row(&q, &naming, &row).unwrap();
        assert_eq!(m.measurement, "nhn_rds_mssql");
        assert!(m.tags.is_empty());
        assert_eq!(m.field("size"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_per_row_keeps_only_value() {
        let q = query(&["measurement", "counter", "value", "extra", "flag"], true);
        let row = vec![
            Value::from("waits"),
            Value::from("PAGEIOLATCH_SH"),
            Value::Int(42),
            Value::Float(9.0),
            Value::Bool(false),
        ];
        let m = map_row(&q, &column_naming(), &row).unwrap();
        assert_eq!(m.measurement, "waits");
        assert_eq!(m.fields.len(), 1);
        assert_eq!(m.field(VALUE_FIELD), Some(&Value::Int(42)));
        assert_eq!(m.tag("counter"), Some("PAGEIOLATCH_SH"));
    }

    #[test]
    fn test_per_row_missing_value() {
        let q = query(&["measurement", "other"], true);
        let row = vec![Value::from("waits"), Value::Int(1)];
        let err = map_row(&q, &column_naming(), &row).unwrap_err();
        assert!(matches!(err, CollectorError::MissingField { ref field, .. } if field == "value"));
    }

    #[test]
    fn test_per_row_string_value_is_missing() {
        let q = query(&["measurement", "value"], true);
        let row = vec![Value::from("waits"), Value::from("12")];
        let err = map_row(&q, &column_naming(), &row).unwrap_err();
        assert!(matches!(err, CollectorError::MissingField { ref field, .. } if field == "value"));
    }

    #[test]
    fn test_per_row_missing_measurement() {
        let q = query(&["value"], true);
        let row = vec![Value::Int(1)];
        let err = map_row(&q, &column_naming(), &row).unwrap_err();
        assert!(
            matches!(err, CollectorError::MissingField { ref field, .. } if field == "measurement")
        );
    }

    #[test]
    fn test_scan_error_propagates() {
        let q = query(&["a", "b"], false);
        let row = vec![Value::Int(1)];
        let err = map_row(&q, &column_naming(), &row).unwrap_err();
        assert!(matches!(err, CollectorError::Scan(_)));
    }

    #[test]
    fn test_accumulate_row_emits_once() {
        let acc = MemoryAccumulator::new();
        let q = query(&["measurement", "free"], false);
        let row = vec![Value::from("disk"), Value::Int(1)];
        accumulate_row(&q, &column_naming(), &row, &acc).unwrap();
        assert_eq!(acc.metric_count(), 1);
        assert_eq!(acc.metrics()[0].measurement, "disk");
    }
}
