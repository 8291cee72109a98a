pub mod benchmark_recorder;
pub mod csv_writer;
pub mod parquet_writer;

pub use benchmark_recorder::BenchmarkRecorder;
pub use csv_writer::CsvBatchWriter;
pub use parquet_writer::ParquetWriter;
