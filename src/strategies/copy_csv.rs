use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{column_list, LoadOutcome, LoadStrategy, LoadUnit};
use crate::config::{CopyFileSource, LoadOptions};
use crate::db::PgSession;
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{Method, Stopwatch};
use crate::utils::constants::CSV_EXTENSION;
use crate::utils::filename::hour_file_path;
use crate::writers::CsvBatchWriter;

const METHOD: Method = Method::CopyCsv;
const STREAM_CHUNK_BYTES: usize = 1 << 20;

/// Stages the batch as CSV, then loads it with `COPY`.
///
/// In `server` mode the database reads the staged file itself, so
/// `server_csv_dir` must name the same directory as seen from the server.
/// In `client` mode the staged bytes are streamed over `COPY FROM STDIN`.
pub struct CopyCsv {
    table: String,
    writer: CsvBatchWriter,
    source: CopyFileSource,
    csv_dir: Option<PathBuf>,
    server_dir: Option<PathBuf>,
    keep_files: bool,
}

impl CopyCsv {
    pub fn new(table: &str, options: &LoadOptions) -> Self {
        Self {
            table: table.to_string(),
            writer: CsvBatchWriter::new().with_header(options.csv_header),
            source: options.copy_file_source,
            csv_dir: options.csv_dir.clone(),
            server_dir: options.server_dir().map(Path::to_path_buf),
            keep_files: options.keep_files,
        }
    }

    fn options_clause(&self) -> String {
        format!("(FORMAT csv, HEADER {})", self.writer.header())
    }

    fn server_sql(&self, path: &Path) -> String {
        let literal = path.to_string_lossy().replace('\'', "''");
        format!(
            "COPY {} ({}) FROM '{}' {}",
            self.table,
            column_list(),
            literal,
            self.options_clause()
        )
    }

    fn stdin_sql(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN {}",
            self.table,
            column_list(),
            self.options_clause()
        )
    }
}

/// Removes the staged file when the job ends, unless it should be kept.
struct StagedFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[async_trait]
impl LoadStrategy<PgSession> for CopyCsv {
    fn method(&self) -> Method {
        METHOD
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut PgSession) -> Result<LoadOutcome> {
        let batch = unit.require_batch(METHOD)?;
        let mut watch = Stopwatch::start();

        // Client mode can stage in a scratch directory; server mode needs a
        // directory the database can read.
        let scratch;
        let local_dir = match (&self.csv_dir, self.source) {
            (Some(dir), _) => dir.as_path(),
            (None, CopyFileSource::Client) => {
                scratch = TempDir::new()?;
                scratch.path()
            }
            (None, CopyFileSource::Server) => {
                return Err(BenchError::Config(
                    "copy_csv in server mode needs CSV_PATH".to_string(),
                ))
            }
        };

        let local_path = hour_file_path(local_dir, unit.index, CSV_EXTENSION);
        let data = self
            .writer
            .to_bytes(&batch.rows)
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Serialize, e))?;
        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Serialize, e))?;
        tokio::fs::write(&local_path, &data)
            .await
            .map_err(|e| BenchError::load(METHOD, LoadPhase::Serialize, e))?;
        let _staged = StagedFile {
            path: local_path.clone(),
            keep: self.keep_files && self.csv_dir.is_some(),
        };

        let client = session.client();
        let copied = match self.source {
            CopyFileSource::Server => {
                let server_dir = self.server_dir.as_deref().unwrap_or(local_dir);
                let sql = self.server_sql(&hour_file_path(server_dir, unit.index, CSV_EXTENSION));
                watch
                    .pure(client.execute(sql.as_str(), &[]))
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Copy, e))?
            }
            CopyFileSource::Client => {
                let data = Bytes::from(data);
                let sql = self.stdin_sql();
                watch
                    .pure(async {
                        let sink = client.copy_in::<_, Bytes>(sql.as_str()).await?;
                        futures::pin_mut!(sink);
                        let mut offset = 0;
                        while offset < data.len() {
                            let end = (offset + STREAM_CHUNK_BYTES).min(data.len());
                            sink.send(data.slice(offset..end)).await?;
                            offset = end;
                        }
                        sink.finish().await
                    })
                    .await
                    .map_err(|e| BenchError::load(METHOD, LoadPhase::Copy, e))?
            }
        };

        debug!(
            "Copied hour {} from {} ({} rows)",
            unit.index,
            local_path.display(),
            copied
        );
        Ok(LoadOutcome {
            rows: batch.row_count(),
            timing: watch.finish(),
        })
    }
}
