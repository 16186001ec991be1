//! # mssql-table-copy
//!
//! Copy one SQL Server table to another server through a CSV snapshot.
//!
//! A copy runs in two decoupled phases:
//!
//! - **Export**: read the table's catalog metadata, derive a column type
//!   clause for each column, and write a snapshot with three header records
//!   (names, types, nullability) followed by the rows
//! - **Import**: validate the snapshot, recreate the table on the
//!   destination from its header, and insert the rows one statement each
//!
//! The phases share nothing but the snapshot file, so each can also run on
//! its own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_table_copy::{Config, CopyMode, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("copy.yaml")?;
//!     let report = Orchestrator::new(config).run(CopyMode::Copy).await?;
//!     println!("Inserted {} rows", report.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod snapshot;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, CopyOptions, EndpointConfig, LiteralMode, RowErrorPolicy};
pub use core::{ColumnDescriptor, Nullability};
pub use drivers::{Connector, DryRunConnector, MssqlConnector, SqlConnection};
pub use error::{CopyError, Result};
pub use orchestrator::{CopyMode, CopyReport, Orchestrator, RunStatus};
pub use snapshot::{scan, SnapshotReader, SnapshotSummary, SnapshotWriter};
pub use typemap::{format_type, TypeSpec};
