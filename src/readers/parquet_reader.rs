use arrow::array::*;
use chrono::{TimeZone, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::PathBuf;

use crate::error::{BenchError, Result};
use crate::models::{Batch, WeatherRow};
use crate::readers::RowSource;
use crate::utils::constants::PARQUET_EXTENSION;
use crate::utils::filename::hour_file_path;

/// Reads `weather_hour<n>.parquet` files written by the exporter.
pub struct ParquetHourReader {
    dir: PathBuf,
}

impl ParquetHourReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn column<'a, T: 'static>(batch: &'a arrow::record_batch::RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| BenchError::InvalidFormat(format!("Invalid or missing column '{}'", name)))
}

fn optional(array: &Float32Array, i: usize) -> Option<f32> {
    array.is_valid(i).then(|| array.value(i))
}

impl RowSource for ParquetHourReader {
    fn batch(&self, index: usize) -> Result<Batch> {
        let path = hour_file_path(&self.dir, index, PARQUET_EXTENSION);
        let file = File::open(&path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut rows = Vec::new();
        for record_batch in reader {
            let record_batch = record_batch?;

            let times = column::<TimestampMicrosecondArray>(&record_batch, "time")?;
            let location_ids = column::<Int32Array>(&record_batch, "location_id")?;
            let latitudes = column::<Float32Array>(&record_batch, "latitude")?;
            let longitudes = column::<Float32Array>(&record_batch, "longitude")?;
            let temperature = column::<Float32Array>(&record_batch, "temperature_2m")?;
            let zonal = column::<Float32Array>(&record_batch, "zonal_wind_10m")?;
            let meridional = column::<Float32Array>(&record_batch, "meridional_wind_10m")?;
            let cloud = column::<Float32Array>(&record_batch, "total_cloud_cover")?;
            let precipitation = column::<Float32Array>(&record_batch, "total_precipitation")?;
            let snowfall = column::<Float32Array>(&record_batch, "snowfall")?;

            rows.reserve(record_batch.num_rows());
            for i in 0..record_batch.num_rows() {
                let time = Utc
                    .timestamp_micros(times.value(i))
                    .single()
                    .ok_or_else(|| {
                        BenchError::InvalidFormat(format!("Invalid timestamp in {}", path.display()))
                    })?;

                rows.push(WeatherRow::new(
                    time,
                    location_ids.is_valid(i).then(|| location_ids.value(i)),
                    latitudes.value(i),
                    longitudes.value(i),
                    optional(temperature, i),
                    optional(zonal, i),
                    optional(meridional, i),
                    optional(cloud, i),
                    optional(precipitation, i),
                    optional(snowfall, i),
                ));
            }
        }

        Ok(Batch::new(index, rows))
    }

    fn describe(&self) -> String {
        format!("parquet files in {}", self.dir.display())
    }
}
