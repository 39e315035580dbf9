//! In-memory accumulator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::metric::Metric;

/// Accumulator that keeps every metric and error in memory.
///
/// Emission order is preserved, so tests can assert on the exact sequence
/// a gather cycle produced.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<Metric>>,
    errors: Mutex<Vec<CollectorError>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all metrics recorded so far.
    pub fn metrics(&self) -> Vec<Metric> {
        lock(&self.metrics).clone()
    }

    /// Metrics recorded under the given measurement, in emission order.
    pub fn metrics_named(&self, measurement: &str) -> Vec<Metric> {
        lock(&self.metrics)
            .iter()
            .filter(|m| m.measurement == measurement)
            .cloned()
            .collect()
    }

    pub fn metric_count(&self) -> usize {
        lock(&self.metrics).len()
    }

    /// Rendered messages of all recorded errors.
    pub fn error_messages(&self) -> Vec<String> {
        lock(&self.errors).iter().map(ToString::to_string).collect()
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    /// Drain recorded errors.
    pub fn take_errors(&self) -> Vec<CollectorError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.metrics).clear();
        lock(&self.errors).clear();
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_metric(&self, metric: Metric) {
        lock(&self.metrics).push(metric);
    }

    fn add_error(&self, err: CollectorError) {
        lock(&self.errors).push(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Fields, MetricKind, Tags, Value};
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn test_add_fields_and_gauge() {
        let acc = MemoryAccumulator::new();
        let mut fields = Fields::new();
        fields.insert("value".into(), Value::Int(1));
        acc.add_fields("alive", fields.clone(), Tags::new(), Utc::now());
        acc.add_gauge("cpu_usage", fields, Tags::new(), None);

        let metrics = acc.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].kind, MetricKind::Fields);
        assert_eq!(metrics[1].kind, MetricKind::Gauge);
        assert_eq!(acc.metrics_named("cpu_usage").len(), 1);
    }

    #[test]
    fn test_errors_are_recorded_and_drained() {
        let acc = MemoryAccumulator::new();
        acc.add_error(CollectorError::Config("bad".into()));
        assert_eq!(acc.error_count(), 1);
        assert!(acc.error_messages()[0].contains("bad"));
        assert_eq!(acc.take_errors().len(), 1);
        assert_eq!(acc.error_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let acc = Arc::new(MemoryAccumulator::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let acc = Arc::clone(&acc);
            handles.push(tokio::spawn(async move {
                let mut fields = Fields::new();
                fields.insert("n".into(), Value::Int(i));
                acc.add_fields("m", fields, Tags::new(), Utc::now());
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(acc.metric_count(), 8);
    }
}
