//! Collector Layer
//!
//! Plugins that gather SQL Server and host metrics into an [`Accumulator`].
//! Each plugin runs one gather cycle per scheduled tick.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait implemented by every plugin
//! - [`Schedule`]: Execution schedule (interval or cron)
//! - [`CollectorRegistry`]: Schedules plugins and handles graceful shutdown
//! - [`sqlserver`]: Row classification, row mapping, query execution and fan-out
//! - [`host`]: CPU and memory samplers
//! - [`plugins`]: `custom_mssql` and `nhn_rds_mssql`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mssqlmon::accumulator::{Accumulator, MemoryAccumulator};
//! use mssqlmon::collector::plugins::{CustomMssql, MssqlPluginConfig};
//! use mssqlmon::collector::sqlserver::TdsDriver;
//! use mssqlmon::collector::{Collector, Schedule};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MssqlPluginConfig::new("primary")
//!     .with_servers(["Server=10.0.0.5;Port=1433;User Id=monitor;Password=secret;"]);
//! let plugin = CustomMssql::new(
//!     &config,
//!     Schedule::interval(Duration::from_secs(10)),
//!     Arc::new(TdsDriver::default()),
//! );
//! let acc: Arc<dyn Accumulator> = Arc::new(MemoryAccumulator::new());
//! plugin.gather(acc).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Accumulator`]: crate::accumulator::Accumulator

pub mod host;
pub mod plugins;
mod registry;
pub mod sqlserver;
mod traits;

pub use registry::{CollectorRegistry, DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, run_collection};
pub use traits::{Collector, CollectorError, GatherErrors, MIN_INTERVAL, Schedule};
