//! Snapshot file format.
//!
//! A snapshot is RFC 4180 comma-separated text:
//!
//! | record | content                                   |
//! |--------|-------------------------------------------|
//! | 0      | column names                              |
//! | 1      | decorated types (`varchar(50)`)           |
//! | 2      | nullability (`NULL`, `NOT NULL`, ...)     |
//! | 3..    | data rows, one field per column           |
//!
//! SQL NULL is written as the field `\N`. An empty field is the empty
//! string. A value that starts with `\` gets one extra leading `\`, so
//! `\N` itself survives as `\\N`.

mod reader;
mod writer;

pub use reader::{scan, RowRecord, SnapshotReader, SnapshotSummary};
pub use writer::SnapshotWriter;

use std::borrow::Cow;

/// Number of header records before the first data record.
pub const HEADER_RECORDS: usize = 3;

/// Field text standing for SQL NULL.
pub const NULL_SENTINEL: &str = "\\N";

const ESCAPE: char = '\\';

/// Encode one value as snapshot field text.
pub fn encode_value(value: Option<&str>) -> Cow<'_, str> {
    match value {
        None => Cow::Borrowed(NULL_SENTINEL),
        Some(v) if v.starts_with(ESCAPE) => Cow::Owned(format!("{}{}", ESCAPE, v)),
        Some(v) => Cow::Borrowed(v),
    }
}

/// Decode snapshot field text back to a value.
pub fn decode_value(field: &str) -> Option<String> {
    if field == NULL_SENTINEL {
        None
    } else if let Some(rest) = field.strip_prefix(ESCAPE) {
        Some(rest.to_string())
    } else {
        Some(field.to_string())
    }
}
