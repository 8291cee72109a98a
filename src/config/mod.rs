//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional settings file,
//! then `POSTGRES_*` / `CSV_PATH` / `SERVER_CSV_PATH` / `CONTAINER_NAME`
//! environment variables, then command-line flags. The result is built once
//! at startup and handed to every component by reference.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::{BenchError, Result};
use crate::models::{Method, TableType};
use crate::utils::constants::{
    DEFAULT_INSERT_CHUNK_ROWS, DEFAULT_PIPELINE_DEPTH, DEFAULT_POSTGRES_HOST,
    DEFAULT_POSTGRES_PORT, DEFAULT_TOOL_BATCH_SIZE, MAX_BIND_PARAMETERS, WEATHER_TABLE,
};

/// Flat view of every file/environment-sourced setting.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    #[serde(default)]
    pub server_csv_path: Option<PathBuf>,
    #[serde(default)]
    pub container_name: Option<String>,

    pub csv_header: bool,
    pub keep_files: bool,
    pub copy_file_source: CopyFileSource,
    pub insert_chunk_rows: usize,
    pub pipeline_depth: usize,
    pub tool_workers: usize,
    pub tool_batch_size: usize,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("host", DEFAULT_POSTGRES_HOST)?
            .set_default("port", DEFAULT_POSTGRES_PORT as i64)?
            .set_default("csv_header", true)?
            .set_default("keep_files", false)?
            .set_default("copy_file_source", "server")?
            .set_default("insert_chunk_rows", DEFAULT_INSERT_CHUNK_ROWS as i64)?
            .set_default("pipeline_depth", DEFAULT_PIPELINE_DEPTH as i64)?
            .set_default("tool_workers", num_cpus::get() as i64)?
            .set_default("tool_batch_size", DEFAULT_TOOL_BATCH_SIZE as i64)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("POSTGRES").prefix_separator("_"))
            .set_override_option("csv_path", std::env::var("CSV_PATH").ok())?
            .set_override_option("server_csv_path", std::env::var("SERVER_CSV_PATH").ok())?
            .set_override_option("container_name", std::env::var("CONTAINER_NAME").ok())?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            host: self.host.clone(),
            port: self.port,
            db_name: self.db_name.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            csv_dir: self.csv_path.clone(),
            server_csv_dir: self.server_csv_path.clone(),
            csv_header: self.csv_header,
            keep_files: self.keep_files,
            copy_file_source: self.copy_file_source,
            insert_chunk_rows: self.insert_chunk_rows,
            pipeline_depth: self.pipeline_depth,
            tool_workers: self.tool_workers,
            tool_batch_size: self.tool_batch_size,
            container_name: self.container_name.clone(),
        }
    }
}

/// Connection parameters for one PostgreSQL database.
#[derive(Debug, Clone, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "POSTGRES_HOST must be set"))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1, message = "POSTGRES_DB_NAME must be set"))]
    pub db_name: String,
    #[validate(length(min = 1, message = "POSTGRES_USER must be set"))]
    pub user: String,
    pub password: Option<String>,
}

impl DatabaseConfig {
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.db_name)
            .user(&self.user)
            .application_name("weather-load-bench");
        if let Some(ref password) = self.password {
            config.password(password);
        }
        config
    }

    /// Connection URL for tools that take one on the command line.
    pub fn url(&self) -> String {
        match self.password {
            Some(ref password) => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, password, self.host, self.port, self.db_name
            ),
            None => format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.db_name
            ),
        }
    }

    /// Printable target without credentials.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db_name)
    }
}

/// Where the server reads a staged CSV file from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyFileSource {
    /// `COPY ... FROM '<path>'`; the server must see `server_csv_dir`.
    Server,
    /// `COPY ... FROM STDIN`, streaming the staged file over the session.
    Client,
}

/// Tuning knobs shared by the loading strategies.
#[derive(Debug, Clone, Validate)]
pub struct LoadOptions {
    pub csv_dir: Option<PathBuf>,
    pub server_csv_dir: Option<PathBuf>,
    pub csv_header: bool,
    pub keep_files: bool,
    pub copy_file_source: CopyFileSource,
    #[validate(range(min = 1, max = 6553))]
    pub insert_chunk_rows: usize,
    #[validate(range(min = 1, max = 1024))]
    pub pipeline_depth: usize,
    #[validate(range(min = 1))]
    pub tool_workers: usize,
    #[validate(range(min = 1))]
    pub tool_batch_size: usize,
    pub container_name: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            csv_dir: None,
            server_csv_dir: None,
            csv_header: true,
            keep_files: false,
            copy_file_source: CopyFileSource::Server,
            insert_chunk_rows: DEFAULT_INSERT_CHUNK_ROWS,
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            tool_workers: num_cpus::get(),
            tool_batch_size: DEFAULT_TOOL_BATCH_SIZE,
            container_name: None,
        }
    }
}

impl LoadOptions {
    /// Directory the server (or external tool) reads staged files from.
    pub fn server_dir(&self) -> Option<&Path> {
        self.server_csv_dir.as_deref().or(self.csv_dir.as_deref())
    }

    /// Rows per multi-VALUES statement, clamped to the bind parameter limit.
    pub fn rows_per_statement(&self, columns: usize) -> usize {
        self.insert_chunk_rows.clamp(1, MAX_BIND_PARAMETERS / columns)
    }
}

/// Which collaborator produces the hourly batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    Csv,
    Parquet,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub data_dir: Option<PathBuf>,
    pub row_limit: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            data_dir: None,
            row_limit: None,
        }
    }
}

/// Table DDL to run before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TablePreparation {
    pub create: bool,
    pub drop_first: bool,
    pub unlogged: bool,
}

/// Everything one benchmark run needs.
#[derive(Debug, Clone, Validate)]
pub struct HarnessConfig {
    pub method: Method,
    pub table_type: TableType,
    #[validate(length(min = 1))]
    pub table: String,
    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,
    pub hours: usize,
    pub benchmarks_file: PathBuf,
    pub parallel_benchmarks_file: Option<PathBuf>,
    pub preparation: TablePreparation,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub load: LoadOptions,
    pub source: SourceConfig,
    pub show_progress: bool,
}

impl HarnessConfig {
    pub fn new(method: Method, table_type: TableType, workers: usize, hours: usize) -> Self {
        Self {
            method,
            table_type,
            table: WEATHER_TABLE.to_string(),
            workers,
            hours,
            benchmarks_file: PathBuf::from("benchmarks.csv"),
            parallel_benchmarks_file: None,
            preparation: TablePreparation::default(),
            database: DatabaseConfig {
                host: DEFAULT_POSTGRES_HOST.to_string(),
                port: DEFAULT_POSTGRES_PORT,
                db_name: String::new(),
                user: String::new(),
                password: None,
            },
            load: LoadOptions::default(),
            source: SourceConfig::default(),
            show_progress: false,
        }
    }

    /// Field and cross-field checks; run before any connection is opened.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        let needs_csv_dir = self.method.is_external()
            || (self.method == Method::CopyCsv
                && self.load.copy_file_source == CopyFileSource::Server);
        if needs_csv_dir && self.load.csv_dir.is_none() {
            return Err(BenchError::Config(format!(
                "{} needs a staging directory (CSV_PATH or --csv-dir)",
                self.method
            )));
        }

        if self.source.kind != SourceKind::Synthetic && self.source.data_dir.is_none() {
            return Err(BenchError::Config(
                "csv and parquet sources need --data-dir".to_string(),
            ));
        }

        Ok(())
    }
}
