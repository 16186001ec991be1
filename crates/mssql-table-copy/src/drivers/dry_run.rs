//! Dry-run connections that record statements instead of executing them.
//!
//! Used by `import --dry-run` to show the DDL and DML an import would issue
//! without touching a destination server. Queries return no rows.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use super::{Connector, RowSink, SqlConnection, TextRow};
use crate::error::Result;

/// Connector whose connections only record statements.
#[derive(Debug, Clone, Default)]
pub struct DryRunConnector {
    transcript: Arc<Mutex<Vec<String>>>,
}

impl DryRunConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements recorded so far, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for DryRunConnector {
    async fn connect(&self, _connection_url: &str) -> Result<Box<dyn SqlConnection>> {
        info!("Dry run: no connection opened, statements are recorded only");
        Ok(Box::new(DryRunConnection {
            transcript: Arc::clone(&self.transcript),
        }))
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// A connection that records every statement it is given.
pub struct DryRunConnection {
    transcript: Arc<Mutex<Vec<String>>>,
}

impl DryRunConnection {
    fn record(&self, sql: &str, params: &[&str]) {
        let entry = if params.is_empty() {
            sql.to_string()
        } else {
            format!("{} -- params: {:?}", sql, params)
        };
        info!("Dry run: {}", entry);
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(entry);
        }
    }
}

#[async_trait]
impl SqlConnection for DryRunConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<TextRow>> {
        self.record(sql, params);
        Ok(Vec::new())
    }

    async fn for_each_row(
        &mut self,
        sql: &str,
        params: &[&str],
        _sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        self.record(sql, params);
        Ok(0)
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        self.record(sql, params);
        Ok(1)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
