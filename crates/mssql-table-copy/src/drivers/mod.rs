//! Database connection layer.
//!
//! The copy phases only need to run statements and iterate result rows, so
//! the driver is reduced to two traits:
//!
//! - [`Connector`]: opens a connection for a connection URL
//! - [`SqlConnection`]: executes statements and streams rows as text
//!
//! Implementations:
//!
//! - [`mssql`]: tiberius (TDS) connections to SQL Server
//! - [`dry_run`]: logs statements instead of executing them
//!
//! Every result value crosses this boundary as text (`None` for SQL NULL),
//! which is the representation the snapshot stores.

pub mod dry_run;
pub mod mssql;

#[cfg(test)]
pub(crate) mod mock;

pub use dry_run::{DryRunConnection, DryRunConnector};
pub use mssql::{MssqlConnection, MssqlConnector};

use async_trait::async_trait;

use crate::error::Result;

/// One result row, values in select-list order, `None` for SQL NULL.
pub type TextRow = Vec<Option<String>>;

/// Callback receiving rows as they are read from the server.
pub type RowSink<'a> = dyn FnMut(TextRow) -> Result<()> + Send + 'a;

/// A single open database connection.
///
/// Driver failures are returned as [`CopyError::Driver`](crate::error::CopyError::Driver);
/// the caller attributes them to the step that was running. Errors returned
/// by a [`RowSink`] pass through unchanged.
#[async_trait]
pub trait SqlConnection: Send {
    /// Run a query and collect all rows of the first result set.
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<TextRow>>;

    /// Run a query and hand each row to `sink` as it arrives.
    ///
    /// Returns the number of rows delivered.
    async fn for_each_row(
        &mut self,
        sql: &str,
        params: &[&str],
        sink: &mut RowSink<'_>,
    ) -> Result<u64>;

    /// Execute a statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for a connection URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection.
    ///
    /// Failures are reported as [`CopyError::Connection`](crate::error::CopyError::Connection).
    async fn connect(&self, connection_url: &str) -> Result<Box<dyn SqlConnection>>;

    /// Connector name for logging.
    fn name(&self) -> &'static str;
}
