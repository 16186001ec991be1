//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::redact_connection_url;

/// Root configuration structure.
///
/// Built once per invocation (YAML file, then CLI overrides) and passed to
/// each phase explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Table to export (required for copy and export).
    #[serde(default)]
    pub source: Option<EndpointConfig>,

    /// Table to create and fill (required for copy and import).
    #[serde(default)]
    pub target: Option<EndpointConfig>,

    /// Snapshot file settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Copy behavior.
    #[serde(default)]
    pub options: CopyOptions,
}

/// One side of the copy: a connection URL plus a schema-qualified table.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// JDBC or ADO.NET connection string.
    pub connection_url: String,

    /// Schema name (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub schema: String,

    /// Table name.
    pub table: String,
}

impl EndpointConfig {
    pub fn new(
        connection_url: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            connection_url: connection_url.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Schema-qualified table name for messages.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("connection_url", &redact_connection_url(&self.connection_url))
            .field("schema", &self.schema)
            .field("table", &self.table)
            .finish()
    }
}

/// Snapshot file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Explicit snapshot path. Copy mode defaults to `<dir>/<source table>.csv`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Directory for derived snapshot paths (default: current directory).
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,

    /// Keep the snapshot after a successful copy (default: true).
    #[serde(default = "default_true")]
    pub keep: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: None,
            dir: default_snapshot_dir(),
            keep: true,
        }
    }
}

/// Copy behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyOptions {
    /// What to do when a single row fails to insert (default: abort).
    #[serde(default)]
    pub on_row_error: RowErrorPolicy,

    /// How data values are sent in INSERT statements (default: inline).
    #[serde(default)]
    pub literal_mode: LiteralMode,

    /// Connection timeout in seconds, 0 disables (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-statement timeout in seconds, 0 disables (default: 300).
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Constraint-name substring marking a primary key when the catalog does
    /// not report the constraint type (default: "PK").
    #[serde(default = "default_pk_marker")]
    pub pk_marker: String,

    /// Row failures kept in the report (default: 100).
    #[serde(default = "default_max_reported_failures")]
    pub max_reported_failures: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            on_row_error: RowErrorPolicy::default(),
            literal_mode: LiteralMode::default(),
            connect_timeout_secs: default_connect_timeout(),
            query_timeout_secs: default_query_timeout(),
            pk_marker: default_pk_marker(),
            max_reported_failures: default_max_reported_failures(),
        }
    }
}

impl CopyOptions {
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.query_timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Handling of a row that fails to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Stop the import at the first failed row.
    #[default]
    Abort,

    /// Log the failure, count it, and continue with the next row.
    Skip,
}

/// How data values reach the destination server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralMode {
    /// Values are rendered as escaped SQL literals in the statement text.
    #[default]
    Inline,

    /// Values are sent as bound `@Pn` parameters.
    Bound,
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_query_timeout() -> u64 {
    300
}

fn default_pk_marker() -> String {
    "PK".to_string()
}

fn default_max_reported_failures() -> usize {
    100
}
