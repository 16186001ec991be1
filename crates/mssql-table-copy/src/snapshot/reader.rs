//! Snapshot reader.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::debug;

use super::{decode_value, HEADER_RECORDS};
use crate::core::identifier::{validate_identifier, validate_type_fragment};
use crate::core::{ColumnDescriptor, Nullability};
use crate::error::{CopyError, Result};

/// One data row read from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    names: Arc<[String]>,
    values: Vec<Option<String>>,
    number: u64,
}

impl RowRecord {
    /// Values in column order, `None` for SQL NULL.
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Value of the named column: `None` if there is no such column,
    /// `Some(None)` for SQL NULL.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i].as_deref())
    }

    /// 1-based position among the data rows.
    pub fn number(&self) -> u64 {
        self.number
    }
}

/// Reads a snapshot: descriptors up front, then data rows on demand.
///
/// Header records are validated by [`open`](Self::open). Each data row is
/// checked for width as it is read.
pub struct SnapshotReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: Vec<ColumnDescriptor>,
    names: Arc<[String]>,
    record: StringRecord,
    rows: u64,
}

impl SnapshotReader {
    /// Open a snapshot and parse its three header records.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut headers = Vec::with_capacity(HEADER_RECORDS);
        for _ in 0..HEADER_RECORDS {
            let mut record = StringRecord::new();
            if !reader
                .read_record(&mut record)
                .map_err(|e| read_error(path, e))?
            {
                break;
            }
            headers.push(record);
        }

        if headers.len() < HEADER_RECORDS {
            return Err(malformed(
                path,
                format!(
                    "expected {} header records (names, types, nullability), found {}",
                    HEADER_RECORDS,
                    headers.len()
                ),
            ));
        }

        let columns = parse_header(&headers[0], &headers[1], &headers[2])
            .map_err(|m| malformed(path, m))?;
        let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect();
        debug!("Opened snapshot {} ({} columns)", path.display(), columns.len());

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            names,
            record: StringRecord::new(),
            rows: 0,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next data row, `Ok(None)` at end of file.
    pub fn next_row(&mut self) -> Result<Option<RowRecord>> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| read_error(&self.path, e))?;
        if !more {
            return Ok(None);
        }

        self.rows += 1;
        if self.record.len() != self.columns.len() {
            return Err(malformed(
                &self.path,
                format!(
                    "data row {} (record {}) has {} fields, expected {}",
                    self.rows,
                    self.rows + HEADER_RECORDS as u64 - 1,
                    self.record.len(),
                    self.columns.len()
                ),
            ));
        }

        Ok(Some(RowRecord {
            names: Arc::clone(&self.names),
            values: self.record.iter().map(decode_value).collect(),
            number: self.rows,
        }))
    }
}

impl Iterator for SnapshotReader {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

/// Shape of a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: u64,
}

/// Validate a whole snapshot without keeping its rows.
///
/// Every header and data record is checked, so a file that scans cleanly
/// can be imported without a [`CopyError::MalformedSnapshot`] midway.
pub fn scan(path: &Path) -> Result<SnapshotSummary> {
    let mut reader = SnapshotReader::open(path)?;
    while reader.next_row()?.is_some() {}
    Ok(SnapshotSummary {
        row_count: reader.rows,
        columns: reader.columns,
    })
}

fn parse_header(
    names: &StringRecord,
    types: &StringRecord,
    nullability: &StringRecord,
) -> std::result::Result<Vec<ColumnDescriptor>, String> {
    if names.is_empty() || (names.len() == 1 && names[0].is_empty()) {
        return Err("header declares no columns".to_string());
    }
    for (label, record) in [("types", types), ("nullability", nullability)] {
        if record.len() != names.len() {
            return Err(format!(
                "{} record has {} fields, names record has {}",
                label,
                record.len(),
                names.len()
            ));
        }
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    for ((name, decorated), clause) in names.iter().zip(types.iter()).zip(nullability.iter()) {
        validate_identifier(name).map_err(|e| format!("column {:?}: {}", name, e))?;
        if !seen.insert(name) {
            return Err(format!("duplicate column name {:?}", name));
        }
        validate_type_fragment(decorated).map_err(|e| format!("column {:?}: {}", name, e))?;
        let clause: Nullability = clause
            .parse()
            .map_err(|e| format!("column {:?}: {}", name, e))?;
        columns.push(ColumnDescriptor::from_decorated(name, decorated, clause)?);
    }
    Ok(columns)
}

fn malformed(path: &Path, message: impl Into<String>) -> CopyError {
    CopyError::malformed(path.display().to_string(), message)
}

fn read_error(path: &Path, err: csv::Error) -> CopyError {
    let message = err.to_string();
    if err.is_io_error() {
        if let csv::ErrorKind::Io(io) = err.into_kind() {
            return CopyError::Io(io);
        }
    }
    malformed(path, message)
}
