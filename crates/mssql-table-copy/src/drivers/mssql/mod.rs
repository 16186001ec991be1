//! Microsoft SQL Server connections over tiberius.
//!
//! Result values are rendered to text in a form SQL Server parses back:
//! integers and decimals in plain notation, `bit` as `1`/`0`, binary as a
//! `0x...` literal, and temporal values in ISO order with the fractional
//! digits the destination type can hold.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use futures::TryStreamExt;
use tiberius::{Client, ColumnData, Config, FromSql, QueryItem, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::{Connector, RowSink, SqlConnection, TextRow};
use crate::config::{redact_connection_url, CopyOptions};
use crate::error::{CopyError, Result};

/// Opens tiberius connections with the configured timeouts.
#[derive(Debug, Clone, Default)]
pub struct MssqlConnector {
    connect_timeout: Option<Duration>,
    query_timeout: Option<Duration>,
}

impl MssqlConnector {
    pub fn new(connect_timeout: Option<Duration>, query_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            query_timeout,
        }
    }

    /// Build a connector from the copy options (0 seconds disables a timeout).
    pub fn from_options(options: &CopyOptions) -> Self {
        Self::new(options.connect_timeout(), options.query_timeout())
    }
}

/// Parse a JDBC (`jdbc:sqlserver://...`) or ADO.NET (`Server=...;`) connection URL.
pub fn parse_connection_url(url: &str) -> Result<Config> {
    let trimmed = url.trim();
    let parsed = if trimmed.to_ascii_lowercase().starts_with("jdbc:") {
        Config::from_jdbc_string(trimmed)
    } else {
        Config::from_ado_string(trimmed)
    };

    parsed.map_err(|e| {
        CopyError::Config(format!(
            "Invalid connection URL {}: {}",
            redact_connection_url(trimmed),
            e
        ))
    })
}

#[async_trait]
impl Connector for MssqlConnector {
    async fn connect(&self, connection_url: &str) -> Result<Box<dyn SqlConnection>> {
        let config = parse_connection_url(connection_url)?;
        let endpoint = config.get_addr();

        let client = with_timeout(self.connect_timeout, "connect", open_client(config))
            .await
            .map_err(|e| e.classify_driver(|m| CopyError::connection(&endpoint, m)))?;

        info!("Connected to SQL Server at {}", endpoint);

        Ok(Box::new(MssqlConnection {
            client,
            endpoint,
            query_timeout: self.query_timeout,
        }))
    }

    fn name(&self) -> &'static str {
        "mssql"
    }
}

async fn open_client(config: Config) -> Result<Client<Compat<TcpStream>>> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| CopyError::driver(e.to_string()))?;
    tcp.set_nodelay(true).ok();
    let client = Client::connect(config, tcp.compat_write()).await?;
    Ok(client)
}

/// One open SQL Server connection.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    endpoint: String,
    query_timeout: Option<Duration>,
}

#[async_trait]
impl SqlConnection for MssqlConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<TextRow>> {
        let mut rows = Vec::new();
        self.for_each_row(sql, params, &mut |row: TextRow| -> Result<()> {
            rows.push(row);
            Ok(())
        })
        .await?;
        Ok(rows)
    }

    async fn for_each_row(
        &mut self,
        sql: &str,
        params: &[&str],
        sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        debug!("Query on {}: {}", self.endpoint, sql);
        let client = &mut self.client;

        with_timeout(self.query_timeout, "query", async move {
            let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            let mut stream = client.query(sql, &bound).await?;

            let mut count = 0u64;
            while let Some(item) = stream.try_next().await? {
                if let QueryItem::Row(row) = item {
                    sink(row.into_iter().map(column_text).collect())?;
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        debug!("Execute on {}: {}", self.endpoint, sql);
        let client = &mut self.client;

        with_timeout(self.query_timeout, "statement", async move {
            let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            let result = client.execute(sql, &bound).await?;
            Ok(result.total())
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        debug!("Closing connection to {}", this.endpoint);
        this.client.close().await?;
        Ok(())
    }
}

async fn with_timeout<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            CopyError::driver(format!("{} timed out after {:?}", what, limit))
        })?,
        None => fut.await,
    }
}

/// Render one result value as snapshot text, `None` for SQL NULL.
fn column_text(data: ColumnData<'static>) -> Option<String> {
    match &data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|b| if b { "1" } else { "0" }.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.map(|g| g.to_string().to_uppercase()),
        ColumnData::Binary(v) => v.as_ref().map(|b| binary_literal(b)),
        ColumnData::Numeric(v) => v.as_ref().map(|n| n.to_string()),
        ColumnData::Xml(v) => v.as_ref().map(|x| x.clone().into_owned().into_string()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) => NaiveDateTime::from_sql(&data)
            .ok()
            .flatten()
            .map(|dt| format_legacy_datetime(&dt)),
        ColumnData::DateTime2(_) => NaiveDateTime::from_sql(&data)
            .ok()
            .flatten()
            .map(|dt| format_datetime2(&dt)),
        ColumnData::Date(_) => NaiveDate::from_sql(&data)
            .ok()
            .flatten()
            .map(|d| d.format("%Y-%m-%d").to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)
            .ok()
            .flatten()
            .map(|t| format!("{}.{:07}", t.format("%H:%M:%S"), t.nanosecond() / 100)),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)
            .ok()
            .flatten()
            .map(|dt| {
                format!(
                    "{}.{:07} {}",
                    dt.format("%Y-%m-%d %H:%M:%S"),
                    dt.nanosecond() / 100,
                    dt.format("%:z")
                )
            }),
    }
}

/// `datetime` and `smalldatetime` need the `T` separator to parse the same
/// under every `SET DATEFORMAT`.
fn format_legacy_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// `datetime2` keeps 100ns resolution: seven fractional digits.
fn format_datetime2(dt: &NaiveDateTime) -> String {
    format!("{}.{:07}", dt.format("%Y-%m-%d %H:%M:%S"), dt.nanosecond() / 100)
}

fn binary_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_column_text_scalars() {
        assert_eq!(column_text(ColumnData::I32(Some(42))), Some("42".into()));
        assert_eq!(column_text(ColumnData::I64(None)), None);
        assert_eq!(column_text(ColumnData::Bit(Some(true))), Some("1".into()));
        assert_eq!(column_text(ColumnData::U8(Some(7))), Some("7".into()));
        assert_eq!(
            column_text(ColumnData::String(Some(Cow::Borrowed("O'Brien")))),
            Some("O'Brien".into())
        );
        assert_eq!(column_text(ColumnData::String(Some(Cow::Borrowed("")))), Some(String::new()));
        assert_eq!(column_text(ColumnData::String(None)), None);
    }

    #[test]
    fn test_column_text_binary_is_hex_literal() {
        let data = ColumnData::Binary(Some(Cow::Owned(vec![0x0A, 0xFF, 0x00])));
        assert_eq!(column_text(data), Some("0x0AFF00".into()));
    }

    #[test]
    fn test_format_datetime2_has_seven_fraction_digits() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_nano_opt(10, 30, 0, 123_456_700)
            .unwrap();
        assert_eq!(format_datetime2(&dt), "2024-06-15 10:30:00.1234567");
    }

    #[test]
    fn test_legacy_datetime_uses_iso_8601_separator() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 123)
            .unwrap();
        assert_eq!(format_legacy_datetime(&dt), "2024-03-04T10:30:00.123");
        assert_eq!(column_text(ColumnData::SmallDateTime(None)), None);
    }

    #[tokio::test]
    async fn test_connect_timeout_becomes_connection_error() {
        let err = with_timeout(
            Some(Duration::from_millis(10)),
            "connect",
            std::future::pending::<Result<()>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CopyError::Driver { .. }));
        assert!(err.to_string().contains("connect timed out after 10ms"));

        let err = err.classify_driver(|m| CopyError::connection("db.example.com:1433", m));
        assert!(matches!(err, CopyError::Connection { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_CONNECTION_ERROR);
    }

    #[tokio::test]
    async fn test_statement_timeout_takes_the_step_error_kind() {
        let err = with_timeout(
            Some(Duration::from_millis(10)),
            "query",
            std::future::pending::<Result<u64>>(),
        )
        .await
        .unwrap_err()
        .classify_driver(|m| CopyError::query("[dbo].[Employees]", m));
        assert!(matches!(err, CopyError::Query { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_QUERY_ERROR);

        let err = with_timeout(
            Some(Duration::from_millis(10)),
            "statement",
            std::future::pending::<Result<u64>>(),
        )
        .await
        .unwrap_err()
        .classify_driver(|m| CopyError::schema_create("[dbo].[Employees]", m));
        assert_eq!(err.exit_code(), crate::error::EXIT_SCHEMA_ERROR);
    }

    #[tokio::test]
    async fn test_no_limit_awaits_the_future() {
        let value = with_timeout(None, "query", async { Ok(7u64) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_connection_url_accepts_both_syntaxes() {
        let jdbc = parse_connection_url(
            "jdbc:sqlserver://db.example.com:1433;databaseName=hr;user=sa;password=secret",
        )
        .unwrap();
        assert_eq!(jdbc.get_addr(), "db.example.com:1433");

        let ado = parse_connection_url(
            "Server=tcp:db.example.com,1444;Database=hr;User Id=sa;Password=secret",
        )
        .unwrap();
        assert_eq!(ado.get_addr(), "db.example.com:1444");
    }
}
