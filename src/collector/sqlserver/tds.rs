//! TDS driver backed by `tiberius`.

use std::time::Duration;

use futures_util::TryStreamExt;
use tiberius::{Client, ColumnData, Config, QueryItem, QueryStream, Row};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::collector::sqlserver::{
    DriverError, ResultCursor, ScanError, Scanner, SqlDriver, SqlSession, Target,
};
use crate::metric::Value;

/// Default time allowed for TCP connect plus login.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Round-trip used by [`SqlSession::ping`].
const PING_SCRIPT: &str = "SELECT 1";

type TdsClient = Client<Compat<TcpStream>>;

/// Driver that connects to SQL Server over TCP.
///
/// Connection strings use the ADO.NET format understood by
/// [`tiberius::Config::from_ado_string`].
#[derive(Debug, Clone)]
pub struct TdsDriver {
    connect_timeout: Duration,
}

impl Default for TdsDriver {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TdsDriver {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn dial(&self, config: Config) -> Result<TdsClient, DriverError> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok(Client::connect(config, tcp.compat_write()).await?)
    }
}

#[async_trait::async_trait]
impl SqlDriver for TdsDriver {
    async fn connect(&self, target: &Target) -> Result<Box<dyn SqlSession>, DriverError> {
        let config = Config::from_ado_string(target.connection_string())?;
        let client = timeout(self.connect_timeout, self.dial(config))
            .await
            .map_err(|_| DriverError::Timeout(self.connect_timeout))??;
        tracing::debug!(server = %target, "Session established");
        Ok(Box::new(TdsSession { client }))
    }
}

struct TdsSession {
    client: TdsClient,
}

#[async_trait::async_trait]
impl SqlSession for TdsSession {
    async fn ping(&mut self) -> Result<(), DriverError> {
        self.client
            .simple_query(PING_SCRIPT)
            .await?
            .into_results()
            .await?;
        Ok(())
    }

    async fn query<'a>(
        &'a mut self,
        script: &str,
    ) -> Result<Box<dyn ResultCursor + 'a>, DriverError> {
        let mut stream = self.client.simple_query(script.to_owned()).await?;
        let columns = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_owned()).collect())
            .unwrap_or_default();
        Ok(Box::new(TdsCursor { stream, columns }))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.client.close().await?;
        Ok(())
    }
}

struct TdsCursor<'a> {
    stream: QueryStream<'a>,
    columns: Vec<String>,
}

#[async_trait::async_trait]
impl ResultCursor for TdsCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Box<dyn Scanner>>, DriverError> {
        while let Some(item) = self.stream.try_next().await? {
            match item {
                QueryItem::Metadata(meta) if meta.result_index() > 0 => return Ok(None),
                QueryItem::Metadata(_) => continue,
                QueryItem::Row(row) if row.result_index() > 0 => return Ok(None),
                QueryItem::Row(row) => return Ok(Some(Box::new(TdsRow(row)))),
            }
        }
        Ok(None)
    }
}

struct TdsRow(Row);

impl Scanner for TdsRow {
    fn scan(&self, dest: &mut [Value]) -> Result<(), ScanError> {
        if dest.len() != self.0.len() {
            return Err(ScanError::ColumnCount {
                expected: dest.len(),
                actual: self.0.len(),
            });
        }
        for ((_, data), slot) in self.0.cells().zip(dest.iter_mut()) {
            *slot = decode(data);
        }
        Ok(())
    }
}

/// Scalar view of one cell.
///
/// Date/time, binary and XML cells have no scalar form and read as
/// [`Value::Null`]: they are classified as fields and left out of the output
/// while the rest of the row is kept.
fn decode(data: &ColumnData<'_>) -> Value {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| Value::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| Value::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::String(g.to_string())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| {
            Value::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }),
        _ => None,
    };
    value.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tiberius::numeric::Numeric;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(&ColumnData::U8(Some(7))), Value::Int(7));
        assert_eq!(decode(&ColumnData::I64(Some(-3))), Value::Int(-3));
        assert_eq!(decode(&ColumnData::F64(Some(1.5))), Value::Float(1.5));
        assert_eq!(decode(&ColumnData::Bit(Some(true))), Value::Bool(true));
        assert_eq!(
            decode(&ColumnData::String(Some(Cow::Borrowed("sda")))),
            Value::from("sda")
        );
        assert_eq!(
            decode(&ColumnData::Numeric(Some(Numeric::new_with_scale(1250, 2)))),
            Value::Float(12.5)
        );
        assert_eq!(decode(&ColumnData::I32(None)), Value::Null);
    }

    #[test]
    fn test_decode_non_scalar_columns_as_null() {
        assert_eq!(
            decode(&ColumnData::Binary(Some(Cow::Owned(vec![0xde, 0xad])))),
            Value::Null
        );
        assert_eq!(decode(&ColumnData::DateTime2(None)), Value::Null);
        assert_eq!(decode(&ColumnData::Xml(None)), Value::Null);
    }
}
