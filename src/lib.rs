//! mssqlmon - SQL Server Metric Collection
//!
//! Plugins for a telemetry agent that connect to SQL Server instances and to
//! the local host, run a fixed set of scripts and stat calls, and emit metric
//! records (measurement, tags, fields, timestamp). It can be embedded as a
//! library or run with the `mssqlmon` executable.
//!
//! # Architecture
//!
//! - **Metric model**: [`Value`], [`Metric`] and line-protocol rendering
//! - **Accumulator**: Thread-safe sink for metrics and non-fatal errors
//! - **Collectors**: Row classification and mapping, query execution, per-target
//!   fan-out, host samplers, the two plugins and their scheduler
//! - **Config**: YAML agent and plugin configuration
//!
//! # Example
//!
//! ```rust
//! use mssqlmon::collector::sqlserver::{RowSnapshot, classify};
//! use mssqlmon::Value;
//!
//! let row: RowSnapshot = [
//!     ("measurement".to_string(), Value::from("disk")),
//!     ("device".to_string(), Value::from("sda")),
//!     ("free".to_string(), Value::Int(100)),
//! ]
//! .into_iter()
//! .collect();
//!
//! let classified = classify(&row);
//! assert_eq!(classified.measurement.as_deref(), Some("disk"));
//! assert_eq!(classified.tags["device"], "sda");
//! assert_eq!(classified.fields["free"], Value::Int(100));
//! ```

pub mod accumulator;
pub mod collector;
pub mod config;
pub mod metric;

pub use accumulator::{Accumulator, MemoryAccumulator, OutputFormat, WriterAccumulator};
pub use collector::{Collector, CollectorError, CollectorRegistry, GatherErrors, Schedule};
pub use metric::{Fields, Metric, MetricKind, Tags, Value};
