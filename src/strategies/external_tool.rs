use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{LoadOutcome, LoadStrategy, LoadUnit};
use crate::config::{DatabaseConfig, LoadOptions};
use crate::db::PgSession;
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Method, TimingSplit};
use crate::readers::csv_reader::count_data_lines;
use crate::utils::constants::CSV_EXTENSION;
use crate::utils::filename::hour_file_path;

const PG_BULKLOAD: &str = "pg_bulkload";
const PARALLEL_COPY: &str = "timescaledb-parallel-copy";

/// Runs an out-of-process loader against an existing hour file.
///
/// The tool sees `server_csv_dir` (inside the container when
/// `container_name` is set); the row count comes from the local copy in
/// `csv_dir` after the timed region.
pub struct ExternalTool {
    method: Method,
    table: String,
    database: DatabaseConfig,
    csv_dir: Option<PathBuf>,
    tool_dir: Option<PathBuf>,
    container: Option<String>,
    header: bool,
    tool_workers: usize,
    batch_size: usize,
}

impl ExternalTool {
    pub fn pg_bulkload(table: &str, options: &LoadOptions, database: &DatabaseConfig) -> Self {
        Self::new(Method::PgBulkload, table, options, database)
    }

    pub fn parallel_copy(table: &str, options: &LoadOptions, database: &DatabaseConfig) -> Self {
        Self::new(Method::TimescaledbParallelCopy, table, options, database)
    }

    fn new(method: Method, table: &str, options: &LoadOptions, database: &DatabaseConfig) -> Self {
        Self {
            method,
            table: table.to_string(),
            database: database.clone(),
            csv_dir: options.csv_dir.clone(),
            tool_dir: options.server_dir().map(Path::to_path_buf),
            container: options.container_name.clone(),
            header: options.csv_header,
            tool_workers: options.tool_workers.max(1),
            batch_size: options.tool_batch_size.max(1),
        }
    }

    fn program(&self) -> &'static str {
        match self.method {
            Method::PgBulkload => PG_BULKLOAD,
            _ => PARALLEL_COPY,
        }
    }

    /// Tool arguments, without any container wrapper.
    fn tool_args(&self, input: &Path) -> Vec<String> {
        let input = input.to_string_lossy().into_owned();
        match self.method {
            Method::PgBulkload => {
                let mut args = vec![
                    format!("--host={}", self.database.host),
                    format!("--port={}", self.database.port),
                    format!("--username={}", self.database.user),
                    format!("--dbname={}", self.database.db_name),
                    "--input".to_string(),
                    input,
                    "--output".to_string(),
                    self.table.clone(),
                    "-o".to_string(),
                    "TYPE=CSV".to_string(),
                    "-o".to_string(),
                    "DELIMITER=,".to_string(),
                    "-o".to_string(),
                    "writer=parallel".to_string(),
                ];
                if self.header {
                    args.extend(["-o".to_string(), "SKIP=1".to_string()]);
                }
                args
            }
            _ => {
                let mut args = vec![
                    "--connection".to_string(),
                    self.database.url(),
                    "--table".to_string(),
                    self.table.clone(),
                    "--batch-size".to_string(),
                    self.batch_size.to_string(),
                    "--workers".to_string(),
                    self.tool_workers.to_string(),
                    "--file".to_string(),
                    input,
                ];
                if self.header {
                    args.push("--skip-header".to_string());
                }
                args
            }
        }
    }

    /// Full command line, wrapped in `docker exec` when a container is set.
    fn command_line(&self, input: &Path) -> (String, Vec<String>) {
        let tool_args = self.tool_args(input);
        match &self.container {
            Some(container) => {
                let mut args = vec!["exec".to_string(), "-u".to_string(), self.database.user.clone()];
                if self.database.password.is_some() {
                    args.extend(["-e".to_string(), "PGPASSWORD".to_string()]);
                }
                args.push(container.clone());
                args.push(self.program().to_string());
                args.extend(tool_args);
                ("docker".to_string(), args)
            }
            None => (self.program().to_string(), tool_args),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref password) = self.database.password {
            command.env("PGPASSWORD", password);
        }

        let output = command
            .output()
            .await
            .map_err(|e| BenchError::load(self.method, LoadPhase::Execute, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} failed: {}", program, stderr.trim());
            return Err(BenchError::ExternalTool {
                program: program.to_string(),
                status: output.status.to_string(),
            });
        }
        debug!("{}: {}", program, String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}

#[async_trait]
impl LoadStrategy<PgSession> for ExternalTool {
    fn method(&self) -> Method {
        self.method
    }

    fn needs_batch(&self) -> bool {
        false
    }

    fn needs_session(&self) -> bool {
        false
    }

    async fn prepare(&self, session: &mut PgSession) -> Result<()> {
        if self.method == Method::PgBulkload {
            session
                .client()
                .batch_execute("CREATE EXTENSION IF NOT EXISTS pg_bulkload")
                .await
                .map_err(|e| BenchError::load(self.method, LoadPhase::Prepare, e))?;
            info!("pg_bulkload extension installed");
        }
        Ok(())
    }

    async fn load(&self, unit: LoadUnit<'_>, _session: &mut PgSession) -> Result<LoadOutcome> {
        self.load_detached(unit).await
    }

    async fn load_detached(&self, unit: LoadUnit<'_>) -> Result<LoadOutcome> {
        let csv_dir = self.csv_dir.as_deref().ok_or_else(|| {
            BenchError::Config(format!("{} needs CSV_PATH", self.method))
        })?;
        let local_path = hour_file_path(csv_dir, unit.index, CSV_EXTENSION);
        if !local_path.exists() {
            return Err(BenchError::load(
                self.method,
                LoadPhase::MissingInput,
                format!("{} does not exist", local_path.display()),
            ));
        }

        let tool_dir = self.tool_dir.as_deref().unwrap_or(csv_dir);
        let (program, args) =
            self.command_line(&hour_file_path(tool_dir, unit.index, CSV_EXTENSION));

        let started = Instant::now();
        self.run(&program, &args).await?;
        let timing = TimingSplit::undivided(started.elapsed());

        let rows = tokio::task::spawn_blocking(move || count_data_lines(&local_path)).await??;

        Ok(LoadOutcome { rows, timing })
    }
}
