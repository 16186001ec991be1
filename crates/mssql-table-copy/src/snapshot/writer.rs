//! Snapshot writer.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::encode_value;
use crate::core::ColumnDescriptor;
use crate::error::{CopyError, Result};

/// Writes a snapshot: the three header records on creation, then data rows.
///
/// Creating a writer truncates any existing file at the path. A writer that
/// is dropped without [`finish`](Self::finish) leaves a partial file behind.
pub struct SnapshotWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: usize,
    rows: u64,
}

impl SnapshotWriter {
    /// Create the snapshot file and write the header records.
    pub fn create(path: &Path, columns: &[ColumnDescriptor]) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| CopyError::write(path.display().to_string(), e.to_string()))?;

        let mut snapshot = Self {
            path: path.to_path_buf(),
            writer,
            columns: columns.len(),
            rows: 0,
        };

        snapshot.write_record(columns.iter().map(|c| c.name.as_str()))?;
        snapshot.write_record(columns.iter().map(|c| c.decorated_type.as_str()))?;
        snapshot.write_record(columns.iter().map(|c| c.nullability.as_str()))?;
        debug!(
            "Wrote snapshot header ({} columns) to {}",
            columns.len(),
            path.display()
        );

        Ok(snapshot)
    }

    /// Append one data row, values in column order.
    pub fn write_row(&mut self, row: &[Option<String>]) -> Result<()> {
        if row.len() != self.columns {
            return Err(self.error(format!(
                "row has {} values, expected {}",
                row.len(),
                self.columns
            )));
        }
        let fields: Vec<Cow<'_, str>> = row.iter().map(|v| encode_value(v.as_deref())).collect();
        self.write_record(fields.iter().map(|f| f.as_bytes()))?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file, returning the number of data rows.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .map_err(|e| self.error(e.to_string()))?;
        Ok(self.rows)
    }

    fn write_record<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(fields)
            .map_err(|e| CopyError::write(self.path.display().to_string(), e.to_string()))
    }

    fn error(&self, message: String) -> CopyError {
        CopyError::write(self.path.display().to_string(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Nullability;

    fn employees() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int", "int", Nullability::NotNullPrimaryKey),
            ColumnDescriptor::new("name", "varchar", "varchar(50)", Nullability::Null),
        ]
    }

    #[test]
    fn test_writes_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Employees.csv");

        let mut writer = SnapshotWriter::create(&path, &employees()).unwrap();
        writer
            .write_row(&[Some("1".into()), Some("Ann".into())])
            .unwrap();
        writer.write_row(&[Some("2".into()), None]).unwrap();
        writer
            .write_row(&[Some("3".into()), Some("O'Brien, \"Pat\"".into())])
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,name");
        assert_eq!(lines[1], "int,varchar(50)");
        assert_eq!(lines[2], "NOT NULL PRIMARY KEY,NULL");
        assert_eq!(lines[3], "1,Ann");
        assert_eq!(lines[4], "2,\\N");
        assert_eq!(lines[5], "3,\"O'Brien, \"\"Pat\"\"\"");
    }

    #[test]
    fn test_rejects_row_width_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut writer = SnapshotWriter::create(&path, &employees()).unwrap();

        let err = writer.write_row(&[Some("1".into())]).unwrap_err();
        assert!(matches!(err, CopyError::Write { .. }));
        assert_eq!(writer.rows_written(), 0);
    }

    #[test]
    fn test_unwritable_path_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("t.csv");
        let err = SnapshotWriter::create(&path, &employees()).err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_WRITE_ERROR);
    }
}
