use crate::error::{BenchError, Result};
use crate::models::{Batch, WeatherRow};
use crate::utils::constants::{
    COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD, DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_ZSTD => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(BenchError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Arrow schema shared with the Parquet hour reader.
    pub fn schema() -> Arc<Schema> {
        let fields = vec![
            Field::new(
                "time",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("location_id", DataType::Int32, true),
            Field::new("latitude", DataType::Float32, false),
            Field::new("longitude", DataType::Float32, false),
            Field::new("temperature_2m", DataType::Float32, true),
            Field::new("zonal_wind_10m", DataType::Float32, true),
            Field::new("meridional_wind_10m", DataType::Float32, true),
            Field::new("total_cloud_cover", DataType::Float32, true),
            Field::new("total_precipitation", DataType::Float32, true),
            Field::new("snowfall", DataType::Float32, true),
        ];

        Arc::new(Schema::new(fields))
    }

    /// Write one hour to a Parquet file, in row groups of `row_group_size`.
    pub fn write_batch(&self, batch: &Batch, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let schema = Self::schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in batch.rows.chunks(self.row_group_size.max(1)) {
            writer.write(&Self::rows_to_record_batch(chunk, schema.clone())?)?;
        }
        writer.close()?;

        Ok(())
    }

    fn rows_to_record_batch(rows: &[WeatherRow], schema: Arc<Schema>) -> Result<RecordBatch> {
        let times: Vec<i64> = rows.iter().map(|r| r.time.timestamp_micros()).collect();
        let location_ids: Vec<Option<i32>> = rows.iter().map(|r| r.location_id).collect();
        let latitudes: Vec<f32> = rows.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f32> = rows.iter().map(|r| r.longitude).collect();

        let measurement = |i: usize| -> ArrayRef {
            let values: Vec<Option<f32>> = rows.iter().map(|r| r.measurements()[i]).collect();
            Arc::new(Float32Array::from(values))
        };

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(times).with_timezone("UTC")),
                Arc::new(Int32Array::from(location_ids)),
                Arc::new(Float32Array::from(latitudes)),
                Arc::new(Float32Array::from(longitudes)),
                measurement(0),
                measurement(1),
                measurement(2),
                measurement(3),
                measurement(4),
                measurement(5),
            ],
        )?;

        Ok(batch)
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}
