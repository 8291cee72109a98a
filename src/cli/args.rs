use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::SourceKind;
use crate::models::{Method, TableType};
use crate::processors::ExportFormat;

#[derive(Parser)]
#[command(name = "weather-load-bench")]
#[command(about = "Parallel bulk-loading benchmarks for hourly weather data in PostgreSQL/TimescaleDB")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Settings file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Synthetic,
    Csv,
    Parquet,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Synthetic => SourceKind::Synthetic,
            SourceArg::Csv => SourceKind::Csv,
            SourceArg::Parquet => SourceKind::Parquet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Parquet,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Parquet => ExportFormat::Parquet,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load hourly batches into the weather table and record timings
    Load {
        #[arg(short, long, help = "Loading method (row_insert, multi_row_insert, copy_binary, copy_csv, pg_bulkload, timescaledb_parallel_copy)")]
        method: Method,

        #[arg(short, long, help = "Target table type: regular or hyper")]
        table_type: TableType,

        #[arg(short, long, default_value_t = 1)]
        workers: usize,

        #[arg(long, help = "Number of hours to load; each hour is one job")]
        hours: usize,

        #[arg(long, help = "Truncate every hour to this many rows")]
        row_limit: Option<usize>,

        #[arg(
            short,
            long,
            help = "Per-job benchmark CSV [default: output/benchmarks-{YYMMDD}.csv]"
        )]
        benchmarks_file: Option<PathBuf>,

        #[arg(long, help = "Aggregate benchmark CSV, one line per run")]
        parallel_benchmarks_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "synthetic")]
        source: SourceArg,

        #[arg(long, help = "Directory with weather_hour<n> files for csv/parquet sources")]
        data_dir: Option<PathBuf>,

        #[arg(long, help = "Staging directory for CSV files (overrides CSV_PATH)")]
        csv_dir: Option<PathBuf>,

        #[arg(long, help = "Create the table before loading")]
        create_table: bool,

        #[arg(long, help = "Drop the table before loading")]
        drop_table: bool,

        #[arg(long, help = "Create the table UNLOGGED")]
        unlogged: bool,

        #[arg(long, help = "Workers inside the external tool")]
        tool_workers: Option<usize>,

        #[arg(long, help = "Keep staged CSV files after copy_csv")]
        keep_files: bool,

        #[arg(long, help = "Write staged CSV files without a header line")]
        no_header: bool,

        #[arg(long, help = "Stream staged CSV over COPY FROM STDIN")]
        client_copy: bool,

        #[arg(long, help = "Hide the progress bar")]
        quiet: bool,
    },

    /// Create the weather table
    CreateTable {
        #[arg(long, help = "Drop the table first")]
        drop_table: bool,

        #[arg(long, help = "Convert to a TimescaleDB hypertable")]
        hypertable: bool,

        #[arg(long)]
        unlogged: bool,
    },

    /// Drop the weather table
    DropTable,

    /// Write hour files for copy_csv and the external tools
    Export {
        #[arg(long)]
        hours: usize,

        #[arg(short, long, help = "Output directory [default: CSV_PATH]")]
        out_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,

        #[arg(long)]
        no_header: bool,

        #[arg(long, help = "Truncate every hour to this many rows")]
        row_limit: Option<usize>,

        #[arg(long, default_value = "snappy", help = "Parquet compression (snappy, zstd, none)")]
        compression: String,

        #[arg(short, long, default_value_t = num_cpus::get())]
        workers: usize,
    },
}
