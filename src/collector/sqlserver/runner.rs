//! Per-target query execution and liveness probing.

use chrono::Utc;

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::collector::sqlserver::{
    MeasurementNaming, Query, SqlDriver, SqlSession, Target, VALUE_FIELD, accumulate_row,
};
use crate::metric::{Fields, Tags, Value};

/// Measurement emitted by the liveness probe.
pub const CONNECTION_ALIVE_MEASUREMENT: &str = "sqlserver_connection_is_alive";

/// Tag carrying the target label on probe metrics.
const SERVER_TAG: &str = "server";

/// Probe a target and record `sqlserver_connection_is_alive`.
///
/// Exactly one metric is emitted, `value = 1` if the session could be opened
/// and pinged, `0` otherwise. The failure itself is returned so the caller
/// can report it.
pub async fn check_server(
    driver: &dyn SqlDriver,
    target: &Target,
    acc: &dyn Accumulator,
) -> Result<(), CollectorError> {
    let server = target.label();
    let result = probe(driver, target).await;

    let alive = result.is_ok();
    let mut fields = Fields::new();
    fields.insert(VALUE_FIELD.to_owned(), Value::Int(i64::from(alive)));
    let mut tags = Tags::new();
    tags.insert(SERVER_TAG.to_owned(), server.clone());
    acc.add_fields(CONNECTION_ALIVE_MEASUREMENT, fields, tags, Utc::now());

    match &result {
        Ok(()) => tracing::debug!(server = %server, "SQL Server is alive"),
        Err(e) => tracing::warn!(server = %server, error = %e, "SQL Server liveness probe failed"),
    }
    result
}

async fn probe(driver: &dyn SqlDriver, target: &Target) -> Result<(), CollectorError> {
    let connection_error = |source| CollectorError::Connection {
        server: target.label(),
        source,
    };

    let mut session = driver.connect(target).await.map_err(connection_error)?;
    let pinged = session.ping().await.map_err(connection_error);
    close(session, target).await;
    pinged
}

/// Run one query against a target, emitting a metric per row.
///
/// The session is opened for this query only and closed on every path. A row
/// that fails to map stops the query; rows already emitted are kept.
///
/// # Errors
/// - [`CollectorError::Connection`] if no session could be opened.
/// - [`CollectorError::Query`] if the script or the row stream failed.
/// - [`CollectorError::Scan`] / [`CollectorError::MissingField`] from row mapping.
pub async fn gather_server(
    driver: &dyn SqlDriver,
    target: &Target,
    mut query: Query,
    naming: &MeasurementNaming,
    acc: &dyn Accumulator,
) -> Result<(), CollectorError> {
    let mut session = driver
        .connect(target)
        .await
        .map_err(|source| CollectorError::Connection {
            server: target.label(),
            source,
        })?;

    let result = run_query(session.as_mut(), &mut query, naming, acc).await;
    close(session, target).await;

    match &result {
        Ok(()) => tracing::debug!(
            server = %target,
            script = %query.script_name,
            columns = query.ordered_columns.len(),
            "Query gathered"
        ),
        Err(e) => tracing::warn!(server = %target, script = %query.script_name, error = %e, "Query failed"),
    }
    result
}

async fn run_query(
    session: &mut dyn SqlSession,
    query: &mut Query,
    naming: &MeasurementNaming,
    acc: &dyn Accumulator,
) -> Result<(), CollectorError> {
    let query_error = |script: &str| {
        let script = script.to_owned();
        move |source| CollectorError::Query { script, source }
    };

    let mut cursor = session
        .query(&query.script)
        .await
        .map_err(query_error(&query.script_name))?;
    query.ordered_columns = cursor.columns().to_vec();

    while let Some(row) = cursor
        .next_row()
        .await
        .map_err(query_error(&query.script_name))?
    {
        accumulate_row(query, naming, row.as_ref(), acc)?;
    }
    Ok(())
}

async fn close(session: Box<dyn SqlSession>, target: &Target) {
    if let Err(e) = session.close().await {
        tracing::debug!(server = %target, error = %e, "Failed to close session cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use crate::collector::sqlserver::{DriverError, ResultCursor, Scanner};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Driver returning a fixed result set.
    struct FixedDriver {
        reachable: bool,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        trailing_error: bool,
        closed: Arc<AtomicUsize>,
    }

    impl FixedDriver {
        fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
            Self {
                reachable: true,
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                trailing_error: false,
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FixedSession {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        trailing_error: bool,
        closed: Arc<AtomicUsize>,
    }

    struct FixedCursor {
        columns: Vec<String>,
        rows: std::vec::IntoIter<Vec<Value>>,
        trailing_error: bool,
    }

    #[async_trait::async_trait]
    impl SqlDriver for FixedDriver {
        async fn connect(&self, _target: &Target) -> Result<Box<dyn SqlSession>, DriverError> {
            if !self.reachable {
                return Err(DriverError::Other("connection refused".into()));
            }
            Ok(Box::new(FixedSession {
                columns: self.columns.clone(),
                rows: self.rows.clone(),
                trailing_error: self.trailing_error,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait::async_trait]
    impl SqlSession for FixedSession {
        async fn ping(&mut self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn query<'a>(
            &'a mut self,
            _script: &str,
        ) -> Result<Box<dyn ResultCursor + 'a>, DriverError> {
            Ok(Box::new(FixedCursor {
                columns: self.columns.clone(),
                rows: std::mem::take(&mut self.rows).into_iter(),
                trailing_error: self.trailing_error,
            }))
        }

        async fn close(self: Box<Self>) -> Result<(), DriverError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl ResultCursor for FixedCursor {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        async fn next_row(&mut self) -> Result<Option<Box<dyn Scanner>>, DriverError> {
            match self.rows.next() {
                Some(row) => Ok(Some(Box::new(row))),
                None if self.trailing_error => {
                    self.trailing_error = false;
                    Err(DriverError::Other("transport reset".into()))
                }
                None => Ok(None),
            }
        }
    }

    fn naming() -> MeasurementNaming {
        MeasurementNaming::Column {
            default: "custom_mssql".into(),
        }
    }

    fn target() -> Target {
        Target::new("Server=db1;Port=1433;Password=secret;")
    }

    #[tokio::test]
    async fn test_gather_server_emits_each_row() {
        let driver = FixedDriver::new(
            &["measurement", "free", "device"],
            vec![
                vec![Value::from("disk"), Value::Int(100), Value::from("sda")],
                vec![Value::from("disk"), Value::Int(200), Value::from("sdb")],
            ],
        );
        let acc = MemoryAccumulator::new();
        let query = Query::new("disks", "SELECT ...", false);

        gather_server(&driver, &target(), query, &naming(), &acc)
            .await
            .unwrap();

        let metrics = acc.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].tag("device"), Some("sda"));
        assert_eq!(metrics[1].field("free"), Some(&Value::Int(200)));
        assert_eq!(driver.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gather_server_stops_at_bad_row() {
        let driver = FixedDriver::new(
            &["measurement", "free"],
            vec![
                vec![Value::from("disk"), Value::Int(1)],
                vec![Value::from("disk")],
                vec![Value::from("disk"), Value::Int(3)],
            ],
        );
        let acc = MemoryAccumulator::new();
        let query = Query::new("disks", "SELECT ...", false);

        let err = gather_server(&driver, &target(), query, &naming(), &acc)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Scan(_)));
        assert_eq!(acc.metric_count(), 1);
        assert_eq!(driver.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gather_server_surfaces_trailing_error() {
        let mut driver = FixedDriver::new(
            &["measurement", "free"],
            vec![vec![Value::from("disk"), Value::Int(1)]],
        );
        driver.trailing_error = true;
        let acc = MemoryAccumulator::new();
        let query = Query::new("disks", "SELECT ...", false);

        let err = gather_server(&driver, &target(), query, &naming(), &acc)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Query { ref script, .. } if script == "disks"));
        assert_eq!(acc.metric_count(), 1);
        assert_eq!(driver.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gather_server_connection_error() {
        let mut driver = FixedDriver::new(&[], vec![]);
        driver.reachable = false;
        let acc = MemoryAccumulator::new();

        let err = gather_server(&driver, &target(), Query::log_backup_size(), &naming(), &acc)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Connection { ref server, .. } if server == "db1:1433"));
        assert!(!err.to_string().contains("secret"));
        assert_eq!(acc.metric_count(), 0);
    }

    #[tokio::test]
    async fn test_check_server_alive() {
        let driver = FixedDriver::new(&[], vec![]);
        let acc = MemoryAccumulator::new();

        check_server(&driver, &target(), &acc).await.unwrap();

        let metrics = acc.metrics_named(CONNECTION_ALIVE_MEASUREMENT);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].field(VALUE_FIELD), Some(&Value::Int(1)));
        assert_eq!(metrics[0].tag("server"), Some("db1:1433"));
        assert_eq!(driver.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_server_unreachable() {
        let mut driver = FixedDriver::new(&[], vec![]);
        driver.reachable = false;
        let acc = MemoryAccumulator::new();

        let result = check_server(&driver, &target(), &acc).await;
        assert!(matches!(result, Err(CollectorError::Connection { .. })));

        let metrics = acc.metrics_named(CONNECTION_ALIVE_MEASUREMENT);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].field(VALUE_FIELD), Some(&Value::Int(0)));
    }
}
