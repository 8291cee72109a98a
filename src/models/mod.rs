pub mod benchmark;
pub mod job;
pub mod timing;
pub mod weather;

pub use benchmark::{BenchmarkRecord, LogRecord, RunRecord};
pub use job::{LoadJob, Method, TableType};
pub use timing::{rate, Stopwatch, TimingSplit};
pub use weather::{Batch, WeatherRow, WeatherRowBuilder, WEATHER_COLUMNS};
