//! Accumulator Layer
//!
//! The sink that collectors hand their metrics and non-fatal errors to.
//! Implementations must be safe to call concurrently: one gather cycle fans
//! out into a task per target and every task writes into the same accumulator.
//!
//! # Components
//!
//! - [`Accumulator`]: Sink trait (`add_fields`, `add_gauge`, `add_error`)
//! - [`MemoryAccumulator`]: In-process buffer, used by tests and embedders
//! - [`WriterAccumulator`]: Renders each metric to an `io::Write` sink (stdout in the agent)

mod memory;
mod writer;

use chrono::{DateTime, Utc};

use crate::collector::CollectorError;
use crate::metric::{Fields, Metric, MetricKind, Tags};

pub use memory::MemoryAccumulator;
pub use writer::{OutputFormat, WriterAccumulator};

/// Destination for gathered metrics and errors.
///
/// Only [`add_metric`](Accumulator::add_metric) and
/// [`add_error`](Accumulator::add_error) must be implemented; the remaining
/// methods build a [`Metric`] and forward it.
pub trait Accumulator: Send + Sync {
    /// Record one metric.
    fn add_metric(&self, metric: Metric);

    /// Record a non-fatal error. Never aborts the running cycle.
    fn add_error(&self, err: CollectorError);

    /// Record untyped fields.
    fn add_fields(&self, measurement: &str, fields: Fields, tags: Tags, timestamp: DateTime<Utc>) {
        self.add_metric(Metric::new(measurement, tags, fields, timestamp));
    }

    /// Record a gauge. A missing timestamp means "now".
    fn add_gauge(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let ts = timestamp.unwrap_or_else(Utc::now);
        self.add_metric(Metric::new(measurement, tags, fields, ts).with_kind(MetricKind::Gauge));
    }
}
