use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::models::{Batch, WeatherRow, WEATHER_COLUMNS};
use crate::utils::constants::DEFAULT_BUFFER_SIZE;

/// Serializes batches to comma-delimited text accepted by `COPY ... (FORMAT csv)`.
pub struct CsvBatchWriter {
    header: bool,
}

impl CsvBatchWriter {
    pub fn new() -> Self {
        Self { header: true }
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn header(&self) -> bool {
        self.header
    }

    /// Write one batch, replacing any previous file. Returns bytes written.
    pub fn write_batch(&self, batch: &Batch, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut out = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        self.write_rows(&batch.rows, &mut out)?;
        out.flush()?;

        Ok(std::fs::metadata(path)?.len())
    }

    pub fn to_bytes(&self, rows: &[WeatherRow]) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(rows.len() * 96);
        self.write_rows(rows, &mut buffer)?;
        Ok(buffer)
    }

    fn write_rows<W: Write>(&self, rows: &[WeatherRow], out: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);

        if self.header {
            writer.write_record(WEATHER_COLUMNS)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvBatchWriter {
    fn default() -> Self {
        Self::new()
    }
}
