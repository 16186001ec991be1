//! Row-by-row inserts into the destination table.
//!
//! Each snapshot row becomes one `INSERT ... VALUES (...)` statement. There
//! is no batching and no enclosing transaction: rows inserted before a
//! failure stay inserted.
//!
//! Literal rendering per field, driven by the column's decorated type:
//!
//! | value                | textual column      | other column                   |
//! |----------------------|---------------------|--------------------------------|
//! | SQL NULL             | `NULL`              | `NULL`                         |
//! | empty string         | `''`                | `NULL`                         |
//! | numeric / `0x` hex   | `'...'`             | verbatim                       |
//! | anything else        | `'...'` (`N'...'`)  | `'...'` (implicit conversion)  |

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{LiteralMode, RowErrorPolicy};
use crate::core::identifier::{qualify_mssql, quote_literal, quote_mssql};
use crate::core::ColumnDescriptor;
use crate::drivers::SqlConnection;
use crate::error::{CopyError, Result};
use crate::snapshot::RowRecord;
use crate::typemap::is_unicode_text;

/// Rows between progress log lines.
const PROGRESS_INTERVAL: u64 = 10_000;

/// How a single field appears in an INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendered<'a> {
    Null,
    Verbatim(&'a str),
    Quoted { text: &'a str, unicode: bool },
}

fn classify<'a>(value: Option<&'a str>, column: &ColumnDescriptor) -> Rendered<'a> {
    let textual = column.is_textual();
    match value {
        None => Rendered::Null,
        Some("") if !textual => Rendered::Null,
        Some(text) if textual => Rendered::Quoted {
            text,
            unicode: is_unicode_text(&column.decorated_type),
        },
        Some(text) if is_numeric_literal(text) || is_hex_literal(text) => Rendered::Verbatim(text),
        Some(text) => Rendered::Quoted {
            text,
            unicode: false,
        },
    }
}

/// Render one value as an inline SQL literal for `column`.
pub fn render_literal(value: Option<&str>, column: &ColumnDescriptor) -> String {
    match classify(value, column) {
        Rendered::Null => "NULL".to_string(),
        Rendered::Verbatim(text) => text.to_string(),
        Rendered::Quoted { text, unicode } => quote_literal(text, unicode),
    }
}

/// Decimal integer, decimal fraction, or scientific notation.
fn is_numeric_literal(value: &str) -> bool {
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let unsigned = |s: &str| s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s).to_string();

    let body = unsigned(value);
    let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&body[..i], Some(unsigned(&body[i + 1..]))),
        None => (body.as_str(), None),
    };
    let (whole, fraction) = match mantissa.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (mantissa, None),
    };

    let has_digits = !whole.is_empty() || fraction.is_some_and(|f| !f.is_empty());
    has_digits
        && all_digits(whole)
        && fraction.map_or(true, all_digits)
        && exponent.map_or(true, |e| !e.is_empty() && all_digits(&e))
}

fn is_hex_literal(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .is_some_and(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// SQL text and bound parameters of one INSERT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<String>,
}

/// Builds INSERT statements for one destination table.
///
/// The `INSERT INTO [schema].[table] ([col], ...) VALUES (` prefix is
/// validated and quoted once; only the value list changes per row.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    prefix: String,
    columns: Vec<ColumnDescriptor>,
    mode: LiteralMode,
}

impl InsertBuilder {
    pub fn new(
        schema: &str,
        table: &str,
        columns: &[ColumnDescriptor],
        mode: LiteralMode,
    ) -> Result<Self> {
        let column_list = columns
            .iter()
            .map(|c| quote_mssql(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        Ok(Self {
            table: format!("{}.{}", schema, table),
            prefix: format!(
                "INSERT INTO {} ({}) VALUES (",
                qualify_mssql(schema, table)?,
                column_list
            ),
            columns: columns.to_vec(),
            mode,
        })
    }

    /// Table name for messages.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Statement for one row, values in column order.
    pub fn build(&self, values: &[Option<String>]) -> InsertStatement {
        debug_assert_eq!(values.len(), self.columns.len());

        let mut params = Vec::new();
        let rendered: Vec<String> = self
            .columns
            .iter()
            .zip(values)
            .map(|(column, value)| match (self.mode, classify(value.as_deref(), column)) {
                (LiteralMode::Bound, Rendered::Quoted { text, .. }) => {
                    params.push(text.to_string());
                    format!("@P{}", params.len())
                }
                _ => render_literal(value.as_deref(), column),
            })
            .collect();

        InsertStatement {
            sql: format!("{}{})", self.prefix, rendered.join(", ")),
            params,
        }
    }
}

/// A row that could not be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based data row number in the snapshot.
    pub row: u64,
    pub message: String,
}

/// Outcome of the row insert loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowStats {
    pub attempted: u64,
    pub inserted: u64,
    pub failed: u64,
    /// Stopped at the first failure under [`RowErrorPolicy::Abort`].
    pub aborted: bool,
    /// First failures, capped at the configured maximum.
    pub failures: Vec<RowFailure>,
}

impl RowStats {
    fn record_failure(&mut self, row: u64, err: &CopyError, max_failures: usize) {
        self.failed += 1;
        if self.failures.len() < max_failures {
            self.failures.push(RowFailure {
                row,
                message: err.to_string(),
            });
        }
    }
}

/// Insert every row, one statement each.
///
/// A failed row is handled by `policy`: `Abort` stops the loop, `Skip` logs
/// it and moves on. Either way the failure is counted in the returned
/// [`RowStats`]; deciding whether that fails the run is up to the caller.
/// Errors reading the rows themselves end the loop with `Err`.
pub async fn insert_rows<I>(
    conn: &mut dyn SqlConnection,
    builder: &InsertBuilder,
    rows: I,
    policy: RowErrorPolicy,
    max_failures: usize,
) -> Result<RowStats>
where
    I: IntoIterator<Item = Result<RowRecord>>,
{
    let mut stats = RowStats::default();

    for row in rows {
        let row = row?;
        stats.attempted += 1;

        let statement = builder.build(row.values());
        let params: Vec<&str> = statement.params.iter().map(String::as_str).collect();
        debug!("Row {}: {}", row.number(), statement.sql);

        match conn.execute(&statement.sql, &params).await {
            Ok(_) => stats.inserted += 1,
            Err(e) => {
                let err = e.classify_driver(|message| CopyError::RowInsert {
                    table: builder.table().to_string(),
                    row: row.number(),
                    message,
                });
                stats.record_failure(row.number(), &err, max_failures);

                match policy {
                    RowErrorPolicy::Abort => {
                        error!("{}", err);
                        stats.aborted = true;
                        break;
                    }
                    RowErrorPolicy::Skip => warn!("Skipping row: {}", err),
                }
            }
        }

        if stats.attempted % PROGRESS_INTERVAL == 0 {
            info!(
                "{}: {} rows attempted, {} inserted, {} failed",
                builder.table(),
                stats.attempted,
                stats.inserted,
                stats.failed
            );
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Nullability;
    use crate::drivers::mock::MockConnector;
    use crate::drivers::Connector;
    use crate::snapshot::SnapshotReader;
    use std::io::Write;

    fn column(name: &str, decorated: &str) -> ColumnDescriptor {
        ColumnDescriptor::from_decorated(name, decorated, Nullability::Null).unwrap()
    }

    fn values(v: &[Option<&str>]) -> Vec<Option<String>> {
        v.iter().map(|x| x.map(str::to_string)).collect()
    }

    #[test]
    fn test_render_literal_policy() {
        let name = column("name", "varchar(50)");
        let title = column("title", "nvarchar(100)");
        let amount = column("amount", "numeric(10,2)");
        let born = column("born", "date");
        let blob = column("blob", "varbinary(max)");

        assert_eq!(render_literal(Some("O'Brien"), &name), "'O''Brien'");
        assert_eq!(render_literal(Some("Zoë"), &title), "N'Zoë'");
        assert_eq!(render_literal(Some(""), &name), "''");
        assert_eq!(render_literal(None, &name), "NULL");
        assert_eq!(render_literal(Some(""), &amount), "NULL");
        assert_eq!(render_literal(None, &amount), "NULL");
        assert_eq!(render_literal(Some("-12.50"), &amount), "-12.50");
        assert_eq!(render_literal(Some("2024-02-29"), &born), "'2024-02-29'");
        assert_eq!(render_literal(Some("0xDEADBEEF"), &blob), "0xDEADBEEF");
        assert_eq!(render_literal(Some("42"), &name), "'42'");
    }

    #[test]
    fn test_non_numeric_is_never_verbatim() {
        let amount = column("amount", "int");
        assert_eq!(render_literal(Some("1); DROP TABLE t; --"), &amount), "'1); DROP TABLE t; --'");
        assert_eq!(render_literal(Some("1e"), &amount), "'1e'");
        assert_eq!(render_literal(Some("."), &amount), "'.'");
        assert_eq!(render_literal(Some("1.5E-3"), &amount), "1.5E-3");
        assert_eq!(render_literal(Some("+7"), &amount), "+7");
    }

    #[test]
    fn test_build_inline_statement() {
        let columns = vec![column("id", "int"), column("name", "varchar(50)")];
        let builder = InsertBuilder::new("dbo", "Employees", &columns, LiteralMode::Inline).unwrap();

        let stmt = builder.build(&values(&[Some("1"), Some("O'Brien")]));
        assert_eq!(
            stmt.sql,
            "INSERT INTO [dbo].[Employees] ([id], [name]) VALUES (1, 'O''Brien')"
        );
        assert!(stmt.params.is_empty());

        let stmt = builder.build(&values(&[Some("2"), None]));
        assert!(stmt.sql.ends_with("VALUES (2, NULL)"));
    }

    #[test]
    fn test_build_bound_statement() {
        let columns = vec![
            column("id", "int"),
            column("name", "nvarchar(50)"),
            column("hired", "datetime2(7)"),
            column("note", "varchar(10)"),
        ];
        let builder = InsertBuilder::new("dbo", "Employees", &columns, LiteralMode::Bound).unwrap();

        let stmt = builder.build(&values(&[
            Some("1"),
            Some("O'Brien"),
            Some("2024-01-02 03:04:05.0000000"),
            None,
        ]));
        assert_eq!(
            stmt.sql,
            "INSERT INTO [dbo].[Employees] ([id], [name], [hired], [note]) VALUES (1, @P1, @P2, NULL)"
        );
        assert_eq!(stmt.params, vec!["O'Brien", "2024-01-02 03:04:05.0000000"]);
    }

    fn snapshot_rows(dir: &tempfile::TempDir, body: &str) -> (Vec<ColumnDescriptor>, SnapshotReader) {
        let path = dir.path().join("Employees.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "id,name\nint,varchar(50)\nNOT NULL PRIMARY KEY,NULL\n{}", body).unwrap();
        let reader = SnapshotReader::open(&path).unwrap();
        (reader.columns().to_vec(), reader)
    }

    #[tokio::test]
    async fn test_insert_rows_abort_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (columns, reader) = snapshot_rows(&dir, "1,Ann\n2,Bob\n3,Cy\n");
        let builder = InsertBuilder::new("dbo", "Employees", &columns, LiteralMode::Inline).unwrap();

        let connector = MockConnector::new().fail_when("VALUES (2,", "duplicate key");
        let mut conn = connector.connect("dst").await.unwrap();

        let stats = insert_rows(conn.as_mut(), &builder, reader, RowErrorPolicy::Abort, 10)
            .await
            .unwrap();
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.aborted);
        assert_eq!(stats.failures[0].row, 2);
        assert!(stats.failures[0].message.contains("duplicate key"));
        assert_eq!(connector.sql().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_rows_skip_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (columns, reader) = snapshot_rows(&dir, "1,Ann\n2,Bob\n3,Cy\n");
        let builder = InsertBuilder::new("dbo", "Employees", &columns, LiteralMode::Inline).unwrap();

        let connector = MockConnector::new().fail_when("VALUES (2,", "duplicate key");
        let mut conn = connector.connect("dst").await.unwrap();

        let stats = insert_rows(conn.as_mut(), &builder, reader, RowErrorPolicy::Skip, 10)
            .await
            .unwrap();
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.failed, 1);
        assert!(!stats.aborted);
        assert!(connector.sql()[2].contains("VALUES (3, 'Cy')"));
    }

    #[tokio::test]
    async fn test_failure_list_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let (columns, reader) = snapshot_rows(&dir, "1,a\n2,b\n3,c\n4,d\n");
        let builder = InsertBuilder::new("dbo", "Employees", &columns, LiteralMode::Inline).unwrap();

        let connector = MockConnector::new().fail_when("INSERT", "read-only database");
        let mut conn = connector.connect("dst").await.unwrap();

        let stats = insert_rows(conn.as_mut(), &builder, reader, RowErrorPolicy::Skip, 2)
            .await
            .unwrap();
        assert_eq!(stats.failed, 4);
        assert_eq!(stats.failures.len(), 2);
    }
}
