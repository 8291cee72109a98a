use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::models::{Batch, WeatherRow, WEATHER_COLUMNS};
use crate::readers::RowSource;
use crate::utils::constants::{CSV_EXTENSION, DEFAULT_BUFFER_SIZE};
use crate::utils::filename::hour_file_path;

/// Reads pre-staged `weather_hour<n>.csv` files, with or without a header.
pub struct CsvHourReader {
    dir: PathBuf,
}

impl CsvHourReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        hour_file_path(&self.dir, index, CSV_EXTENSION)
    }

    pub fn read_file(path: &Path, index: usize) -> Result<Batch> {
        let file = File::open(path)?;
        let mut buffered = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let has_header = has_header_line(&mut buffered)?;
        buffered.seek(SeekFrom::Start(0))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .from_reader(buffered);

        let rows = reader
            .deserialize::<WeatherRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Batch::new(index, rows))
    }
}

impl RowSource for CsvHourReader {
    fn batch(&self, index: usize) -> Result<Batch> {
        let path = self.path_for(index);
        if !path.exists() {
            return Err(BenchError::InvalidFormat(format!(
                "no staged file for hour {}: {}",
                index,
                path.display()
            )));
        }
        Self::read_file(&path, index)
    }

    fn describe(&self) -> String {
        format!("csv files in {}", self.dir.display())
    }
}

/// A header line starts with the first column name instead of a timestamp.
fn has_header_line(reader: &mut impl BufRead) -> Result<bool> {
    let mut first = String::new();
    reader.read_line(&mut first)?;
    Ok(first.trim_start().starts_with(WEATHER_COLUMNS[0]))
}

/// Count data lines in a staged file without parsing them.
pub fn count_data_lines(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
    let has_header = has_header_line(&mut reader)?;
    reader.seek(SeekFrom::Start(0))?;

    let lines = reader
        .lines()
        .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .count();

    Ok(if has_header { lines.saturating_sub(1) } else { lines })
}
