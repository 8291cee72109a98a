pub mod constants;
pub mod filename;
pub mod location;
pub mod logging;
pub mod progress;

pub use constants::*;
pub use filename::{generate_default_benchmarks_filename, hour_file_path};
pub use location::{latlon_to_location_id, normalize_longitude};
pub use progress::ProgressReporter;
