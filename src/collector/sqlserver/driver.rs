//! Database driver seam.
//!
//! [`SqlDriver`] opens sessions, a [`SqlSession`] runs scripts, a
//! [`ResultCursor`] yields rows lazily, and each row is a [`Scanner`] that
//! decodes itself into caller-provided placeholders.

use std::time::Duration;

use thiserror::Error;

use crate::collector::sqlserver::Target;
use crate::metric::Value;

/// Errors raised by a driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// TDS protocol or server-side error.
    #[error("tds error: {0}")]
    Tds(#[from] tiberius::error::Error),

    /// Socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Driver-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Errors raised while decoding a row.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Placeholder count differs from the row's column count.
    #[error("expected {expected} columns, row has {actual}")]
    ColumnCount { expected: usize, actual: usize },
}

/// One result row that can decode itself.
pub trait Scanner: Send {
    /// Decode every column, in order, into `dest`.
    ///
    /// # Errors
    /// [`ScanError::ColumnCount`] if `dest.len()` differs from the row width.
    fn scan(&self, dest: &mut [Value]) -> Result<(), ScanError>;
}

/// Rows already decoded into values. Used by in-memory drivers.
impl Scanner for Vec<Value> {
    fn scan(&self, dest: &mut [Value]) -> Result<(), ScanError> {
        if dest.len() != self.len() {
            return Err(ScanError::ColumnCount {
                expected: dest.len(),
                actual: self.len(),
            });
        }
        dest.clone_from_slice(self);
        Ok(())
    }
}

/// Opens sessions against targets.
#[async_trait::async_trait]
pub trait SqlDriver: Send + Sync + 'static {
    /// Establish a session. The session is exclusively owned by the caller.
    async fn connect(&self, target: &Target) -> Result<Box<dyn SqlSession>, DriverError>;
}

/// An open connection.
#[async_trait::async_trait]
pub trait SqlSession: Send {
    /// Lightweight round-trip to validate the session.
    async fn ping(&mut self) -> Result<(), DriverError>;

    /// Execute `script` verbatim and return a cursor over its first result set.
    async fn query<'a>(
        &'a mut self,
        script: &str,
    ) -> Result<Box<dyn ResultCursor + 'a>, DriverError>;

    /// Close the session.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Lazy sequence of rows from one result set.
#[async_trait::async_trait]
pub trait ResultCursor: Send {
    /// Ordered column names from the result-set metadata.
    fn columns(&self) -> &[String];

    /// Next row, `None` once the result set is exhausted.
    ///
    /// An `Err` after some rows is a cursor-level failure reported by the server.
    async fn next_row(&mut self) -> Result<Option<Box<dyn Scanner>>, DriverError>;
}
