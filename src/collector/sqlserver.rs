//! SQL Server collection.
//!
//! Turns arbitrary result sets into metrics:
//!
//! - [`classify`]: string columns become tags (or the measurement), everything else a field
//! - [`map_row`] / [`accumulate_row`]: scan one row and build its metric
//! - [`gather_server`] / [`check_server`]: run one script, or probe liveness, against a target
//! - [`SqlServerGatherer`]: probe every target, then fan the scripts out concurrently
//!
//! Database access goes through the [`SqlDriver`] seam; [`TdsDriver`] speaks
//! TDS to a real server.

mod classify;
mod driver;
mod fanout;
mod mapper;
mod query;
mod runner;
mod target;
mod tds;

pub use classify::{Classification, MEASUREMENT_COLUMN, RowSnapshot, classify};
pub use driver::{DriverError, ResultCursor, ScanError, Scanner, SqlDriver, SqlSession};
pub use fanout::SqlServerGatherer;
pub use mapper::{MeasurementNaming, VALUE_FIELD, accumulate_row, map_row};
pub use query::{LOG_BACKUP_SIZE_SCRIPT, LOG_BACKUP_SIZE_SCRIPT_NAME, Query};
pub use runner::{CONNECTION_ALIVE_MEASUREMENT, check_server, gather_server};
pub use target::Target;
pub use tds::{DEFAULT_CONNECT_TIMEOUT, TdsDriver};
