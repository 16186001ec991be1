//! Copy orchestrator - runs the export and import phases for one table.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, EndpointConfig};
use crate::drivers::{Connector, MssqlConnector, SqlConnection};
use crate::error::{CopyError, Result, EXIT_ROW_INSERT_ERROR};
use crate::snapshot::{scan, SnapshotReader, SnapshotWriter};
use crate::source;
use crate::target::{self, InsertBuilder, RowFailure, RowStats};

/// Which phases a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Export the source table, then import the snapshot into the target.
    Copy,
    /// Export the source table to a snapshot only.
    Export,
    /// Import an existing snapshot only.
    Import,
}

impl CopyMode {
    pub fn exports(&self) -> bool {
        matches!(self, CopyMode::Copy | CopyMode::Export)
    }

    pub fn imports(&self) -> bool {
        matches!(self, CopyMode::Copy | CopyMode::Import)
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CopyMode::Copy => "copy",
            CopyMode::Export => "export",
            CopyMode::Import => "import",
        })
    }
}

/// Final state of a run that got as far as producing a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Every row was attempted, some were skipped after failing.
    CompletedWithErrors,
    /// The import stopped at the first failed row.
    Aborted,
}

/// Result of a copy run.
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    /// Unique run identifier.
    pub run_id: String,

    pub mode: CopyMode,

    pub status: RunStatus,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub snapshot_path: PathBuf,

    /// Columns in the copied table.
    pub columns: usize,

    /// Rows written to the snapshot (export phase).
    pub rows_exported: u64,

    /// Rows read back from the snapshot (import phase).
    pub rows_attempted: u64,

    pub rows_inserted: u64,

    pub rows_failed: u64,

    /// First row failures, capped by `options.max_reported_failures`.
    pub failures: Vec<RowFailure>,
}

impl CopyReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Process exit code: non-zero when any row failed to insert.
    pub fn exit_code(&self) -> u8 {
        if self.rows_failed > 0 {
            EXIT_ROW_INSERT_ERROR
        } else {
            0
        }
    }
}

/// Copy orchestrator.
///
/// Each phase opens its own connection and closes it before returning,
/// whether the phase succeeded or not. The phases share nothing but the
/// snapshot file.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn Connector>,
    target: Arc<dyn Connector>,
}

impl Orchestrator {
    /// Create an orchestrator connecting to SQL Server on both sides.
    pub fn new(config: Config) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(MssqlConnector::from_options(&config.options));
        Self {
            source: Arc::clone(&connector),
            target: connector,
            config,
        }
    }

    /// Replace the connector used for the source table.
    pub fn with_source_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.source = connector;
        self
    }

    /// Replace the connector used for the target table (e.g. a dry run).
    pub fn with_target_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.target = connector;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the phases selected by `mode`.
    ///
    /// Errors abort the run. Row insert failures do not: they are counted in
    /// the report and reflected in [`CopyReport::exit_code`].
    pub async fn run(self, mode: CopyMode) -> Result<CopyReport> {
        self.config.validate(mode)?;
        let snapshot_path = self
            .config
            .snapshot_path()
            .ok_or_else(|| CopyError::Config("snapshot path could not be determined".into()))?;

        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting {} run: {}", mode, run_id);

        let mut columns = 0;
        let mut rows_exported = 0;
        let mut stats = RowStats::default();

        if let (true, Some(endpoint)) = (mode.exports(), self.config.source.as_ref()) {
            info!("Phase 1: Exporting {} to {}", endpoint.full_name(), snapshot_path.display());
            let (count, rows) = self.export(endpoint, &snapshot_path).await?;
            columns = count;
            rows_exported = rows;
        }

        if let (true, Some(endpoint)) = (mode.imports(), self.config.target.as_ref()) {
            info!("Phase 2: Importing {} into {}", snapshot_path.display(), endpoint.full_name());
            let (count, row_stats) = self.import(endpoint, &snapshot_path).await?;
            columns = count;
            stats = row_stats;
        }

        let status = if stats.aborted {
            RunStatus::Aborted
        } else if stats.failed > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };

        if mode == CopyMode::Copy && status == RunStatus::Completed && !self.config.snapshot.keep {
            if let Err(e) = std::fs::remove_file(&snapshot_path) {
                warn!("Failed to remove snapshot {}: {}", snapshot_path.display(), e);
            }
        }

        let completed_at = Utc::now();
        let report = CopyReport {
            run_id,
            mode,
            status,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            snapshot_path,
            columns,
            rows_exported,
            rows_attempted: stats.attempted,
            rows_inserted: stats.inserted,
            rows_failed: stats.failed,
            failures: stats.failures,
        };

        info!(
            "Copy {:?}: {} columns, {} rows exported, {} inserted, {} failed in {:.1}s",
            report.status,
            report.columns,
            report.rows_exported,
            report.rows_inserted,
            report.rows_failed,
            report.duration_seconds
        );

        Ok(report)
    }

    /// Export phase: catalog, then rows, into a fresh snapshot.
    async fn export(&self, endpoint: &EndpointConfig, path: &Path) -> Result<(usize, u64)> {
        let mut conn = self.source.connect(&endpoint.connection_url).await?;
        let result = self.export_with(conn.as_mut(), endpoint, path).await;
        close_quietly(conn, "source").await;
        result
    }

    async fn export_with(
        &self,
        conn: &mut dyn SqlConnection,
        endpoint: &EndpointConfig,
        path: &Path,
    ) -> Result<(usize, u64)> {
        let columns = source::read_columns(
            conn,
            &endpoint.schema,
            &endpoint.table,
            &self.config.options.pk_marker,
        )
        .await?;

        let mut writer = SnapshotWriter::create(path, &columns)?;
        let mut sink = |row: Vec<Option<String>>| writer.write_row(&row);
        source::read_rows(conn, &endpoint.schema, &endpoint.table, &columns, &mut sink).await?;
        let rows = writer.finish()?;

        info!("Exported {} rows to {}", rows, path.display());
        Ok((columns.len(), rows))
    }

    /// Import phase: validate the snapshot, then replace the target table
    /// and insert its rows.
    async fn import(&self, endpoint: &EndpointConfig, path: &Path) -> Result<(usize, RowStats)> {
        // The whole file is checked before the target is touched.
        let summary = scan(path)?;
        info!(
            "Snapshot {} holds {} columns and {} rows",
            path.display(),
            summary.columns.len(),
            summary.row_count
        );

        let mut conn = self.target.connect(&endpoint.connection_url).await?;
        let result = self.import_with(conn.as_mut(), endpoint, path).await;
        close_quietly(conn, "target").await;
        result
    }

    async fn import_with(
        &self,
        conn: &mut dyn SqlConnection,
        endpoint: &EndpointConfig,
        path: &Path,
    ) -> Result<(usize, RowStats)> {
        let reader = SnapshotReader::open(path)?;
        let columns = reader.columns().to_vec();

        target::create_table(conn, &endpoint.schema, &endpoint.table, &columns).await?;

        let options = &self.config.options;
        let builder = InsertBuilder::new(
            &endpoint.schema,
            &endpoint.table,
            &columns,
            options.literal_mode,
        )?;
        let stats = target::insert_rows(
            conn,
            &builder,
            reader,
            options.on_row_error,
            options.max_reported_failures,
        )
        .await?;

        info!(
            "Imported {} of {} rows into {}",
            stats.inserted,
            stats.attempted,
            endpoint.full_name()
        );
        Ok((columns.len(), stats))
    }
}

async fn close_quietly(conn: Box<dyn SqlConnection>, side: &str) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close {} connection: {}", side, e);
    }
}
