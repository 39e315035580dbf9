//! Accumulator that renders metrics to an output stream.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::metric::Metric;

/// Output encoding, one metric per line.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// InfluxDB line protocol.
    #[default]
    Influx,
    /// One JSON object per line.
    Json,
}

/// Writes each metric as a single line to `W`.
///
/// Errors go to the log. Lines that cannot be rendered or written are counted
/// in [`dropped_metrics`](WriterAccumulator::dropped_metrics).
pub struct WriterAccumulator<W: Write + Send> {
    out: Mutex<W>,
    format: OutputFormat,
    dropped_metrics: AtomicU64,
}

impl<W: Write + Send> std::fmt::Debug for WriterAccumulator<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterAccumulator")
            .field("format", &self.format)
            .field("dropped_metrics", &self.dropped_metrics())
            .finish_non_exhaustive()
    }
}

impl WriterAccumulator<std::io::Stdout> {
    /// Accumulator printing to stdout.
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> WriterAccumulator<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out: Mutex::new(out),
            format,
            dropped_metrics: AtomicU64::new(0),
        }
    }

    /// Number of metrics that could not be rendered or written.
    pub fn dropped_metrics(&self) -> u64 {
        self.dropped_metrics.load(Ordering::Relaxed)
    }

    /// Consume the accumulator and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, metric: &Metric) -> Option<String> {
        match self.format {
            OutputFormat::Influx => metric.to_line_protocol(),
            OutputFormat::Json => match serde_json::to_string(metric) {
                Ok(line) => Some(line),
                Err(e) => {
                    tracing::warn!(measurement = %metric.measurement, error = %e, "Failed to encode metric");
                    None
                }
            },
        }
    }
}

impl<W: Write + Send> Accumulator for WriterAccumulator<W> {
    fn add_metric(&self, metric: Metric) {
        let Some(line) = self.render(&metric) else {
            tracing::debug!(measurement = %metric.measurement, "Dropping metric without fields");
            self.dropped_metrics.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Failed to write metric");
            self.dropped_metrics.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_error(&self, err: CollectorError) {
        tracing::error!(error = %err, "Error in plugin");
    }
}
