/// Destination table
pub const WEATHER_TABLE: &str = "weather";

/// ERA5 0.25° global grid
pub const GRID_RESOLUTION: f32 = 0.25;
pub const GRID_LATITUDES: usize = 721;
pub const GRID_LONGITUDES: usize = 1440;
pub const ROWS_PER_HOUR: usize = GRID_LATITUDES * GRID_LONGITUDES; // 1,038,240

/// Geocoding origin used for location ids
pub const MIN_LATITUDE: f32 = -90.0;
pub const MIN_LONGITUDE: f32 = -179.75;

/// First hour of the synthetic dataset: 1995-03-01T00:00Z
pub const SYNTHETIC_EPOCH: &str = "1995-03-01T00:00:00Z";

/// File names
pub const HOUR_FILE_PREFIX: &str = "weather_hour";
pub const CSV_EXTENSION: &str = "csv";
pub const PARQUET_EXTENSION: &str = "parquet";

/// Benchmark log values
pub const UNITS_LABEL: &str = "inserts";
pub const STATUS_OK: &str = "ok";

/// PostgreSQL caps a statement at 65535 bind parameters
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Loading defaults
pub const DEFAULT_INSERT_CHUNK_ROWS: usize = 1000;
pub const DEFAULT_PIPELINE_DEPTH: usize = 8;
pub const DEFAULT_TOOL_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 100_000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Connection defaults
pub const DEFAULT_POSTGRES_HOST: &str = "localhost";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
