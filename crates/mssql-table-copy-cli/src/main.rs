//! mssql-table-copy CLI - copy a SQL Server table through a CSV snapshot.

use clap::{Parser, Subcommand, ValueEnum};
use mssql_table_copy::{
    scan, Config, CopyError, CopyMode, CopyReport, DryRunConnector, EndpointConfig, LiteralMode,
    Orchestrator, RowErrorPolicy, SnapshotSummary,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-table-copy")]
#[command(about = "Copy a SQL Server table to another server through a CSV snapshot")]
#[command(version)]
struct Cli {
    /// Path to an optional YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    /// What to do when a row fails to insert
    #[arg(long, value_enum, global = true)]
    on_row_error: Option<RowErrorArg>,

    /// How values are sent in INSERT statements
    #[arg(long, value_enum, global = true)]
    literal_mode: Option<LiteralModeArg>,

    /// Connection timeout in seconds, 0 disables [default: 30]
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Per-statement timeout in seconds, 0 disables [default: 300]
    #[arg(long, global = true)]
    query_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a table and import it into another server
    Copy {
        /// Source connection URL (JDBC or ADO.NET syntax)
        source_url: String,
        /// Source schema
        source_schema: String,
        /// Source table
        source_table: String,
        /// Target connection URL (JDBC or ADO.NET syntax)
        target_url: String,
        /// Target schema
        target_schema: String,
        /// Target table
        target_table: String,

        /// Directory for the <SOURCE_TABLE>.csv snapshot [default: .]
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Delete the snapshot after a fully successful copy
        #[arg(long)]
        remove_snapshot: bool,
    },

    /// Export a table to a snapshot file
    Export {
        /// Source connection URL (JDBC or ADO.NET syntax)
        url: String,
        /// Source schema
        schema: String,
        /// Source table
        table: String,
        /// Snapshot file to create
        output: PathBuf,
    },

    /// Import a snapshot file into a table, replacing it
    Import {
        /// Snapshot file to read
        snapshot: PathBuf,
        /// Target connection URL (JDBC or ADO.NET syntax)
        url: String,
        /// Target schema
        schema: String,
        /// Target table
        table: String,

        /// Print the statements instead of connecting to the target
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a snapshot file and show its columns
    Inspect {
        /// Snapshot file to read
        snapshot: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RowErrorArg {
    Abort,
    Skip,
}

impl From<RowErrorArg> for RowErrorPolicy {
    fn from(arg: RowErrorArg) -> Self {
        match arg {
            RowErrorArg::Abort => RowErrorPolicy::Abort,
            RowErrorArg::Skip => RowErrorPolicy::Skip,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LiteralModeArg {
    Inline,
    Bound,
}

impl From<LiteralModeArg> for LiteralMode {
    fn from(arg: LiteralModeArg) -> Self {
        match arg {
            LiteralModeArg::Inline => LiteralMode::Inline,
            LiteralModeArg::Bound => LiteralMode::Bound,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, CopyError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    apply_option_overrides(&cli, &mut config);

    match cli.command {
        Commands::Inspect { snapshot } => {
            let summary = scan(&snapshot)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&snapshot, &summary);
            }
            Ok(0)
        }

        Commands::Copy {
            source_url,
            source_schema,
            source_table,
            target_url,
            target_schema,
            target_table,
            snapshot_dir,
            remove_snapshot,
        } => {
            config.source = Some(EndpointConfig::new(source_url, source_schema, source_table));
            config.target = Some(EndpointConfig::new(target_url, target_schema, target_table));
            if let Some(dir) = snapshot_dir {
                config.snapshot.dir = dir;
            }
            if remove_snapshot {
                config.snapshot.keep = false;
            }

            let report = Orchestrator::new(config).run(CopyMode::Copy).await?;
            print_report(&report, cli.output_json)?;
            Ok(report.exit_code())
        }

        Commands::Export {
            url,
            schema,
            table,
            output,
        } => {
            config.source = Some(EndpointConfig::new(url, schema, table));
            config.snapshot.path = Some(output);

            let report = Orchestrator::new(config).run(CopyMode::Export).await?;
            print_report(&report, cli.output_json)?;
            Ok(report.exit_code())
        }

        Commands::Import {
            snapshot,
            url,
            schema,
            table,
            dry_run,
        } => {
            config.target = Some(EndpointConfig::new(url, schema, table));
            config.snapshot.path = Some(snapshot);

            let mut orchestrator = Orchestrator::new(config);
            let dry_run_connector = dry_run.then(DryRunConnector::new);
            if let Some(connector) = &dry_run_connector {
                orchestrator = orchestrator.with_target_connector(Arc::new(connector.clone()));
            }

            let report = orchestrator.run(CopyMode::Import).await?;

            if let Some(connector) = dry_run_connector {
                for statement in connector.statements() {
                    println!("{};", statement);
                }
            }
            print_report(&report, cli.output_json)?;
            Ok(report.exit_code())
        }
    }
}

/// CLI flags win over values from the configuration file.
fn apply_option_overrides(cli: &Cli, config: &mut Config) {
    let options = &mut config.options;
    if let Some(policy) = cli.on_row_error {
        options.on_row_error = policy.into();
    }
    if let Some(mode) = cli.literal_mode {
        options.literal_mode = mode.into();
    }
    if let Some(secs) = cli.connect_timeout {
        options.connect_timeout_secs = secs;
    }
    if let Some(secs) = cli.query_timeout {
        options.query_timeout_secs = secs;
    }
}

fn print_report(report: &CopyReport, output_json: bool) -> Result<(), CopyError> {
    if output_json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let status_msg = match report.exit_code() {
        0 => "Copy completed!",
        _ => "Copy finished with row failures",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!("  Mode: {}", report.mode);
    println!("  Snapshot: {}", report.snapshot_path.display());
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!("  Columns: {}", report.columns);
    if report.mode.exports() {
        println!("  Rows exported: {}", report.rows_exported);
    }
    if report.mode.imports() {
        println!(
            "  Rows inserted: {}/{}",
            report.rows_inserted, report.rows_attempted
        );
    }
    if report.rows_failed > 0 {
        println!("  Rows failed: {}", report.rows_failed);
        for failure in &report.failures {
            println!("    row {}: {}", failure.row, failure.message);
        }
    }
    Ok(())
}

fn print_summary(path: &std::path::Path, summary: &SnapshotSummary) {
    println!("Snapshot: {}", path.display());
    println!("  Rows: {}", summary.row_count);
    println!("  Columns:");
    for column in &summary.columns {
        println!(
            "    {} {} {}",
            column.name, column.decorated_type, column.nullability
        );
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only results.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
