use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::readers::RowSource;
use crate::utils::constants::{COMPRESSION_SNAPPY, CSV_EXTENSION, PARQUET_EXTENSION};
use crate::utils::filename::hour_file_path;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvBatchWriter, ParquetWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_EXTENSION,
            ExportFormat::Parquet => PARQUET_EXTENSION,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" => Ok(ExportFormat::Parquet),
            _ => Err(BenchError::Config(format!(
                "Unknown export format '{}'. Expected 'csv' or 'parquet'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    pub rows: usize,
}

/// Writes hour files for the file-based strategies and external tools.
pub struct BatchExporter {
    max_workers: usize,
    format: ExportFormat,
    header: bool,
    compression: String,
}

impl BatchExporter {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            format: ExportFormat::Csv,
            header: true,
            compression: COMPRESSION_SNAPPY.to_string(),
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_compression(mut self, compression: &str) -> Self {
        self.compression = compression.to_string();
        self
    }

    /// Materialize hours `0..hours` into `out_dir`.
    pub fn export(
        &self,
        source: &dyn RowSource,
        hours: usize,
        out_dir: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<ExportSummary> {
        std::fs::create_dir_all(out_dir)?;

        let csv = CsvBatchWriter::new().with_header(self.header);
        let parquet = ParquetWriter::new().with_compression(&self.compression)?;
        let written = AtomicUsize::new(0);

        if let Some(p) = progress {
            p.set_message(&format!("Exporting {} hours to {}", hours, out_dir.display()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| BenchError::Config(e.to_string()))?;

        let results: Result<Vec<(usize, PathBuf, usize)>> = pool.install(|| {
            (0..hours)
                .into_par_iter()
                .map(|hour| {
                    let batch = source.batch(hour)?;
                    let path = hour_file_path(out_dir, hour, self.format.extension());
                    match self.format {
                        ExportFormat::Csv => {
                            csv.write_batch(&batch, &path)?;
                        }
                        ExportFormat::Parquet => parquet.write_batch(&batch, &path)?,
                    }
                    debug!("Wrote {} ({} rows)", path.display(), batch.row_count());

                    written.fetch_add(1, Ordering::Relaxed);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                    Ok((hour, path, batch.row_count()))
                })
                .collect()
        });

        let mut files = results?;
        files.sort_by_key(|(hour, _, _)| *hour);

        let summary = ExportSummary {
            rows: files.iter().map(|(_, _, rows)| rows).sum(),
            files: files.into_iter().map(|(_, path, _)| path).collect(),
        };

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Exported {} files",
                written.load(Ordering::Relaxed)
            ));
        }
        Ok(summary)
    }
}
