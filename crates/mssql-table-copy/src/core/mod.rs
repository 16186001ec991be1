//! Core types shared by both copy phases.
//!
//! - [`schema`]: column descriptors, nullability and raw catalog rows
//! - [`identifier`]: validation and quoting of structural SQL fragments

pub mod identifier;
pub mod schema;

pub use identifier::{qualify_mssql, quote_literal, quote_mssql, validate_identifier};
pub use schema::{CatalogColumn, ColumnDescriptor, Nullability};
