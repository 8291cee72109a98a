use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};

use crate::utils::constants::HOUR_FILE_PREFIX;

/// Path of the staged file for one hour, e.g. `dir/weather_hour7.csv`.
pub fn hour_file_path(dir: &Path, hour: usize, extension: &str) -> PathBuf {
    dir.join(format!("{}{}.{}", HOUR_FILE_PREFIX, hour, extension))
}

/// Default benchmark log with format: benchmarks-{YYMMDD}.csv
pub fn generate_default_benchmarks_filename() -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year

    let filename = format!("benchmarks-{:02}{:02}{:02}.csv", year, now.month(), now.day());
    PathBuf::from("output").join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_file_path() {
        let path = hour_file_path(Path::new("/mnt/ramdisk"), 12, "csv");
        assert_eq!(path, PathBuf::from("/mnt/ramdisk/weather_hour12.csv"));
    }

    #[test]
    fn test_generate_default_benchmarks_filename() {
        let filename = generate_default_benchmarks_filename();
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output/"));
        assert!(filename_str.contains("benchmarks-"));
        assert!(filename_str.ends_with(".csv"));
    }
}
