//! Scripted in-memory connections for unit tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Connector, RowSink, SqlConnection, TextRow};
use crate::error::{CopyError, Result};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// (sql substring, rows returned)
    pub results: Vec<(String, Vec<TextRow>)>,
    /// (sql substring, error message)
    pub failures: Vec<(String, String)>,
    pub refuse_connections: bool,
    /// Every statement seen, with its parameters.
    pub statements: Vec<(String, Vec<String>)>,
    pub connects: usize,
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, pattern: &str, rows: Vec<Vec<Option<&str>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|v| v.map(str::to_string)).collect())
            .collect();
        self.state().results.push((pattern.to_string(), rows));
        self
    }

    pub fn fail_when(self, pattern: &str, message: &str) -> Self {
        self.state()
            .failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    pub fn refusing(self) -> Self {
        self.state().refuse_connections = true;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// SQL text of every statement seen, in order.
    pub fn sql(&self) -> Vec<String> {
        self.state()
            .statements
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, connection_url: &str) -> Result<Box<dyn SqlConnection>> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(CopyError::connection(connection_url, "connection refused"));
        }
        state.connects += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub(crate) struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn run(&self, sql: &str, params: &[&str]) -> Result<Vec<TextRow>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));

        if let Some((_, message)) = state.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            return Err(CopyError::driver(message.clone()));
        }

        Ok(state
            .results
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<TextRow>> {
        self.run(sql, params)
    }

    async fn for_each_row(
        &mut self,
        sql: &str,
        params: &[&str],
        sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        let rows = self.run(sql, params)?;
        let mut count = 0;
        for row in rows {
            sink(row)?;
            count += 1;
        }
        Ok(count)
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        self.run(sql, params).map(|_| 1)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
