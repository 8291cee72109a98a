pub mod csv_reader;
pub mod parquet_reader;
pub mod synthetic_reader;

pub use csv_reader::CsvHourReader;
pub use parquet_reader::ParquetHourReader;
pub use synthetic_reader::SyntheticReader;

use std::sync::Arc;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{BenchError, Result};
use crate::models::Batch;

/// Produces the rows for one hour of data.
///
/// Implementations must be deterministic: the same index always yields the
/// same logical rows so repeated benchmark runs are comparable. Calls may
/// block on I/O or burn CPU; the scheduler runs them on the blocking pool.
pub trait RowSource: Send + Sync {
    fn batch(&self, index: usize) -> Result<Batch>;

    fn describe(&self) -> String;
}

/// Truncates every batch of the wrapped source to at most `limit` rows.
pub struct RowLimit {
    inner: Arc<dyn RowSource>,
    limit: usize,
}

impl RowLimit {
    pub fn new(inner: Arc<dyn RowSource>, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl RowSource for RowLimit {
    fn batch(&self, index: usize) -> Result<Batch> {
        let mut batch = self.inner.batch(index)?;
        batch.truncate(self.limit);
        Ok(batch)
    }

    fn describe(&self) -> String {
        format!("{} (first {} rows)", self.inner.describe(), self.limit)
    }
}

/// Build the configured source.
pub fn open_source(config: &SourceConfig) -> Result<Arc<dyn RowSource>> {
    let data_dir = || {
        config.data_dir.clone().ok_or_else(|| {
            BenchError::Config("csv and parquet sources need --data-dir".to_string())
        })
    };

    let source: Arc<dyn RowSource> = match config.kind {
        SourceKind::Synthetic => Arc::new(SyntheticReader::new()),
        SourceKind::Csv => Arc::new(CsvHourReader::new(data_dir()?)),
        SourceKind::Parquet => Arc::new(ParquetHourReader::new(data_dir()?)),
    };

    Ok(match config.row_limit {
        Some(limit) => Arc::new(RowLimit::new(source, limit)),
        None => source,
    })
}
