//! Core collector traits and types.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::accumulator::Accumulator;
use crate::collector::sqlserver::{DriverError, ScanError};

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Could not open or validate a session with a server.
    #[error("connection to {server} failed: {source}")]
    Connection {
        /// Credential-free server label.
        server: String,
        #[source]
        source: DriverError,
    },

    /// Script execution or row iteration failed.
    #[error("script {script} failed: {source}")]
    Query {
        script: String,
        #[source]
        source: DriverError,
    },

    /// A result row could not be decoded.
    #[error("row scan failed: {0}")]
    Scan(#[from] ScanError),

    /// A per-row result lacks a required column.
    #[error("query {script}: row has no {field} column")]
    MissingField { script: String, field: String },

    /// A cumulative counter went backwards between two samples.
    #[error(
        "current total CPU time is less than previous total CPU time for {cpu} ({current} < {previous})"
    )]
    Regression {
        cpu: String,
        previous: f64,
        current: f64,
    },

    /// Host statistics could not be read.
    #[error("host stats error: {0}")]
    HostStat(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// A per-target task panicked or was cancelled.
    #[error("gather task failed: {0}")]
    Task(String),
}

/// All errors collected during one fan-out, in the order they were observed.
#[derive(Debug, Default)]
pub struct GatherErrors(Vec<CollectorError>);

impl GatherErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: CollectorError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollectorError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Hand every error to the accumulator's error sink.
    pub fn report(self, acc: &dyn Accumulator) {
        for err in self.0 {
            acc.add_error(err);
        }
    }
}

impl IntoIterator for GatherErrors {
    type Item = CollectorError;
    type IntoIter = std::vec::IntoIter<CollectorError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<CollectorError> for GatherErrors {
    fn extend<I: IntoIterator<Item = CollectorError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl std::fmt::Display for GatherErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} gather error(s)", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GatherErrors {}

/// Schedule for collector execution.
///
/// Supports both fixed interval and cron-based scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval between gather cycles.
    ///
    /// Interval is clamped to a minimum of 1 second.
    Interval(Duration),

    /// Cron expression for scheduled execution.
    ///
    /// Uses standard cron syntax: `sec min hour day month weekday` (6-field).
    /// Example: `"0 */5 * * * *"` = every 5 minutes at second 0
    Cron(String),
}

impl Schedule {
    /// Create an interval schedule.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn interval(duration: Duration) -> Self {
        if duration < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            Self::Interval(MIN_INTERVAL)
        } else {
            Self::Interval(duration)
        }
    }

    /// Create a cron schedule with immediate validation.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the cron expression is invalid.
    pub fn cron(expr: impl AsRef<str>) -> Result<Self, CollectorError> {
        use std::str::FromStr;

        let expr = expr.as_ref();
        cron::Schedule::from_str(expr)
            .map_err(|e| CollectorError::Config(format!("invalid cron expression: {e}")))?;

        Ok(Self::Cron(expr.to_string()))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {:?}", d),
            Self::Cron(expr) => write!(f, "cron: {}", expr),
        }
    }
}

/// A plugin that runs one gather cycle per scheduled tick.
///
/// # Error Handling
///
/// - **Per-target failures** (unreachable server, failed script, bad row) are
///   handed to [`Accumulator::add_error`] and do not fail the cycle.
/// - **Cycle failures** are returned as `Err`. The registry logs them and
///   forwards them to the same error sink.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Unique instance name from configuration.
    fn name(&self) -> &str;

    /// Plugin kind (e.g. `"custom_mssql"`).
    fn category(&self) -> &str;

    /// Execution schedule.
    fn schedule(&self) -> &Schedule;

    /// Perform one gather cycle.
    async fn gather(&self, acc: Arc<dyn Accumulator>) -> Result<(), CollectorError>;
}
