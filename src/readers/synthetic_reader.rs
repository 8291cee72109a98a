use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

use crate::error::Result;
use crate::models::{Batch, WeatherRow};
use crate::readers::RowSource;
use crate::utils::constants::{GRID_LATITUDES, GRID_LONGITUDES, GRID_RESOLUTION, SYNTHETIC_EPOCH};
use crate::utils::location::{latlon_to_location_id, normalize_longitude};

/// Deterministic ERA5-shaped grid, one full global field per hour.
///
/// Rows are ordered like an ERA5 surface slice: latitude from 90 down to -90,
/// east longitude from 0 upward, normalized to -180..180. Values come from
/// smooth analytic fields so every hour differs but is reproducible.
pub struct SyntheticReader {
    latitudes: usize,
    longitudes: usize,
    epoch: DateTime<Utc>,
}

impl SyntheticReader {
    pub fn new() -> Self {
        Self::with_grid(GRID_LATITUDES, GRID_LONGITUDES)
    }

    /// A smaller grid anchored at the same origin, for tests and dry runs.
    pub fn with_grid(latitudes: usize, longitudes: usize) -> Self {
        let epoch = DateTime::parse_from_rfc3339(SYNTHETIC_EPOCH)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

        Self {
            latitudes: latitudes.min(GRID_LATITUDES),
            longitudes: longitudes.min(GRID_LONGITUDES),
            epoch,
        }
    }

    pub fn rows_per_hour(&self) -> usize {
        self.latitudes * self.longitudes
    }

    pub fn hour_timestamp(&self, index: usize) -> DateTime<Utc> {
        self.epoch + Duration::hours(index as i64)
    }

    fn latitude_band(&self, lat_index: usize, time: DateTime<Utc>, phase: f32) -> Result<Vec<WeatherRow>> {
        let latitude = 90.0 - lat_index as f32 * GRID_RESOLUTION;
        let lat_rad = latitude.to_radians();

        (0..self.longitudes)
            .map(|lon_index| {
                let longitude = normalize_longitude(lon_index as f32 * GRID_RESOLUTION);
                let lon_rad = longitude.to_radians();

                let temperature = 30.0 * lat_rad.cos() - 10.0 + 5.0 * (lon_rad + phase).sin();
                let zonal = 10.0 * (2.0 * lat_rad).sin() * phase.cos();
                let meridional = 5.0 * lon_rad.cos() * (lat_rad + phase).sin();
                let cloud = (0.5 + 0.5 * (3.0 * lat_rad + 2.0 * lon_rad + phase).sin()).clamp(0.0, 1.0);
                let precipitation = (2.0 * (4.0 * lon_rad + phase).sin()).max(0.0);
                let snowfall = if temperature < 0.0 { precipitation * 0.8 } else { 0.0 };

                Ok(WeatherRow::new(
                    time,
                    Some(latlon_to_location_id(latitude, longitude)?),
                    latitude,
                    longitude,
                    Some(temperature),
                    Some(zonal),
                    Some(meridional),
                    Some(cloud),
                    Some(precipitation),
                    Some(snowfall),
                ))
            })
            .collect()
    }
}

impl Default for SyntheticReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSource for SyntheticReader {
    fn batch(&self, index: usize) -> Result<Batch> {
        let time = self.hour_timestamp(index);
        let phase = (index % 24) as f32 * std::f32::consts::TAU / 24.0;

        // Bands are generated in parallel; collect keeps them in latitude order
        let bands: Vec<Vec<WeatherRow>> = (0..self.latitudes)
            .into_par_iter()
            .map(|lat_index| self.latitude_band(lat_index, time, phase))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(self.rows_per_hour());
        for band in bands {
            rows.extend(band);
        }

        Ok(Batch::new(index, rows))
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {}x{} grid from {}",
            self.latitudes,
            self.longitudes,
            self.epoch.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::ROWS_PER_HOUR;

    #[test]
    fn test_batches_are_deterministic() {
        let reader = SyntheticReader::with_grid(8, 16);
        let first = reader.batch(3).unwrap();
        let second = reader.batch(3).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.row_count(), 128);
    }

    #[test]
    fn test_hours_advance_timestamp() {
        let reader = SyntheticReader::with_grid(2, 2);
        let zero = reader.batch(0).unwrap();
        let five = reader.batch(5).unwrap();
        assert_eq!(five.rows[0].time - zero.rows[0].time, Duration::hours(5));
        assert_ne!(zero.rows[0].temperature_2m, five.rows[0].temperature_2m);
    }

    #[test]
    fn test_grid_order_and_location_ids() {
        let reader = SyntheticReader::with_grid(2, 3);
        let batch = reader.batch(0).unwrap();

        assert_eq!(batch.rows[0].latitude, 90.0);
        assert_eq!(batch.rows[0].longitude, 0.0);
        assert_eq!(batch.rows[1].longitude, 0.25);
        assert_eq!(batch.rows[3].latitude, 89.75);

        let ids: std::collections::HashSet<_> =
            batch.rows.iter().map(|r| r.location_id).collect();
        assert_eq!(ids.len(), batch.row_count());
    }

    #[test]
    fn test_values_stay_physical() {
        let reader = SyntheticReader::with_grid(40, 80);
        let batch = reader.batch(11).unwrap();
        for row in &batch.rows {
            let cloud = row.total_cloud_cover.unwrap();
            assert!((0.0..=1.0).contains(&cloud));
            assert!(row.total_precipitation.unwrap() >= 0.0);
            assert!(row.snowfall.unwrap() <= row.total_precipitation.unwrap());
        }
    }

    #[test]
    fn test_full_grid_size() {
        assert_eq!(SyntheticReader::new().rows_per_hour(), ROWS_PER_HOUR);
    }
}
