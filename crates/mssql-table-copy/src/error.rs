//! Error types for the table copy library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when a database connection cannot be established.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when the source catalog cannot be read.
pub const EXIT_CATALOG_ERROR: u8 = 3;
/// Exit code when the source row query fails.
pub const EXIT_QUERY_ERROR: u8 = 4;
/// Exit code when the snapshot cannot be written.
pub const EXIT_WRITE_ERROR: u8 = 5;
/// Exit code for structurally invalid snapshots.
pub const EXIT_MALFORMED_SNAPSHOT: u8 = 6;
/// Exit code for other file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code when the destination table cannot be created.
pub const EXIT_SCHEMA_ERROR: u8 = 8;
/// Exit code when one or more rows failed to insert.
pub const EXIT_ROW_INSERT_ERROR: u8 = 9;
/// Exit code for driver errors that were not attributed to a step.
pub const EXIT_DRIVER_ERROR: u8 = 10;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection could not be established (driver, host, login, timeout).
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// Source metadata query failed or returned nothing usable.
    #[error("Catalog unavailable for {table}: {message}")]
    CatalogUnavailable { table: String, message: String },

    /// Source data query failed.
    #[error("Query failed for {table}: {message}")]
    Query { table: String, message: String },

    /// Snapshot could not be written.
    #[error("Failed to write snapshot {path}: {message}")]
    Write { path: String, message: String },

    /// Snapshot is structurally invalid.
    #[error("Malformed snapshot {path}: {message}")]
    MalformedSnapshot { path: String, message: String },

    /// Destination DDL failed.
    #[error("Failed to create table {table}: {message}")]
    SchemaCreate { table: String, message: String },

    /// Destination DML failed for a single row.
    #[error("Insert into {table} failed at row {row}: {message}")]
    RowInsert {
        table: String,
        row: u64,
        message: String,
    },

    /// Driver error not yet attributed to a copy step.
    #[error("Database error: {message}")]
    Driver { message: String, code: Option<u32> },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tiberius::error::Error> for CopyError {
    fn from(err: tiberius::error::Error) -> Self {
        let code = match &err {
            tiberius::error::Error::Server(token) => Some(token.code()),
            _ => None,
        };
        CopyError::Driver {
            message: err.to_string(),
            code,
        }
    }
}

impl CopyError {
    /// Create a Driver error without a server code.
    pub fn driver(message: impl Into<String>) -> Self {
        CopyError::Driver {
            message: message.into(),
            code: None,
        }
    }

    /// Create a Connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a CatalogUnavailable error.
    pub fn catalog(table: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::CatalogUnavailable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Query error.
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Write error.
    pub fn write(path: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a MalformedSnapshot error.
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::MalformedSnapshot {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a SchemaCreate error.
    pub fn schema_create(table: impl Into<String>, message: impl Into<String>) -> Self {
        CopyError::SchemaCreate {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Attribute a bare driver error to the step that produced it.
    ///
    /// Errors that already carry a step kind pass through unchanged.
    pub fn classify_driver(self, kind: impl FnOnce(String) -> CopyError) -> CopyError {
        match self {
            CopyError::Driver { message, .. } => kind(message),
            other => other,
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            CopyError::Config(_) | CopyError::Yaml(_) | CopyError::Json(_) => EXIT_CONFIG_ERROR,
            CopyError::Connection { .. } => EXIT_CONNECTION_ERROR,
            CopyError::CatalogUnavailable { .. } => EXIT_CATALOG_ERROR,
            CopyError::Query { .. } => EXIT_QUERY_ERROR,
            CopyError::Write { .. } => EXIT_WRITE_ERROR,
            CopyError::MalformedSnapshot { .. } => EXIT_MALFORMED_SNAPSHOT,
            CopyError::Io(_) => EXIT_IO_ERROR,
            CopyError::SchemaCreate { .. } => EXIT_SCHEMA_ERROR,
            CopyError::RowInsert { .. } => EXIT_ROW_INSERT_ERROR,
            CopyError::Driver { .. } => EXIT_DRIVER_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;
