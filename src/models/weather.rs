use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{BenchError, Result};

/// Column order shared by the table, CSV files and COPY statements.
pub const WEATHER_COLUMNS: [&str; 10] = [
    "time",
    "location_id",
    "latitude",
    "longitude",
    "temperature_2m",
    "zonal_wind_10m",
    "meridional_wind_10m",
    "total_cloud_cover",
    "total_precipitation",
    "snowfall",
];

/// One grid cell observation for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherRow {
    #[serde(with = "timestamp_format")]
    pub time: DateTime<Utc>,

    pub location_id: Option<i32>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f32,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f32,

    // Celsius
    pub temperature_2m: Option<f32>,

    // m/s
    pub zonal_wind_10m: Option<f32>,
    pub meridional_wind_10m: Option<f32>,

    // fraction 0..1
    pub total_cloud_cover: Option<f32>,

    // mm
    pub total_precipitation: Option<f32>,
    pub snowfall: Option<f32>,
}

impl WeatherRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time: DateTime<Utc>,
        location_id: Option<i32>,
        latitude: f32,
        longitude: f32,
        temperature_2m: Option<f32>,
        zonal_wind_10m: Option<f32>,
        meridional_wind_10m: Option<f32>,
        total_cloud_cover: Option<f32>,
        total_precipitation: Option<f32>,
        snowfall: Option<f32>,
    ) -> Self {
        Self {
            time,
            location_id,
            latitude,
            longitude,
            temperature_2m,
            zonal_wind_10m,
            meridional_wind_10m,
            total_cloud_cover,
            total_precipitation,
            snowfall,
        }
    }

    pub fn builder() -> WeatherRowBuilder {
        WeatherRowBuilder::new()
    }

    /// Measurement columns in table order.
    pub fn measurements(&self) -> [Option<f32>; 6] {
        [
            self.temperature_2m,
            self.zonal_wind_10m,
            self.meridional_wind_10m,
            self.total_cloud_cover,
            self.total_precipitation,
            self.snowfall,
        ]
    }

    /// Field-wise comparison with a tolerance for the 32-bit columns.
    pub fn approx_eq(&self, other: &WeatherRow, tolerance: f32) -> bool {
        let close = |a: f32, b: f32| (a - b).abs() <= tolerance;
        let close_opt = |a: Option<f32>, b: Option<f32>| match (a, b) {
            (Some(a), Some(b)) => close(a, b),
            (None, None) => true,
            _ => false,
        };

        self.time == other.time
            && self.location_id == other.location_id
            && close(self.latitude, other.latitude)
            && close(self.longitude, other.longitude)
            && self
                .measurements()
                .iter()
                .zip(other.measurements().iter())
                .all(|(a, b)| close_opt(*a, *b))
    }
}

pub struct WeatherRowBuilder {
    time: Option<DateTime<Utc>>,
    location_id: Option<i32>,
    latitude: Option<f32>,
    longitude: Option<f32>,
    temperature_2m: Option<f32>,
    zonal_wind_10m: Option<f32>,
    meridional_wind_10m: Option<f32>,
    total_cloud_cover: Option<f32>,
    total_precipitation: Option<f32>,
    snowfall: Option<f32>,
}

impl Default for WeatherRowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherRowBuilder {
    pub fn new() -> Self {
        Self {
            time: None,
            location_id: None,
            latitude: None,
            longitude: None,
            temperature_2m: None,
            zonal_wind_10m: None,
            meridional_wind_10m: None,
            total_cloud_cover: None,
            total_precipitation: None,
            snowfall: None,
        }
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn location_id(mut self, id: i32) -> Self {
        self.location_id = Some(id);
        self
    }

    pub fn coordinates(mut self, latitude: f32, longitude: f32) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn temperature_2m(mut self, value: f32) -> Self {
        self.temperature_2m = Some(value);
        self
    }

    pub fn wind(mut self, zonal: f32, meridional: f32) -> Self {
        self.zonal_wind_10m = Some(zonal);
        self.meridional_wind_10m = Some(meridional);
        self
    }

    pub fn total_cloud_cover(mut self, value: f32) -> Self {
        self.total_cloud_cover = Some(value);
        self
    }

    pub fn total_precipitation(mut self, value: f32) -> Self {
        self.total_precipitation = Some(value);
        self
    }

    pub fn snowfall(mut self, value: f32) -> Self {
        self.snowfall = Some(value);
        self
    }

    pub fn build(self) -> Result<WeatherRow> {
        let row = WeatherRow {
            time: self
                .time
                .ok_or_else(|| BenchError::InvalidFormat("missing time".to_string()))?,
            location_id: self.location_id,
            latitude: self
                .latitude
                .ok_or_else(|| BenchError::InvalidFormat("missing latitude".to_string()))?,
            longitude: self
                .longitude
                .ok_or_else(|| BenchError::InvalidFormat("missing longitude".to_string()))?,
            temperature_2m: self.temperature_2m,
            zonal_wind_10m: self.zonal_wind_10m,
            meridional_wind_10m: self.meridional_wind_10m,
            total_cloud_cover: self.total_cloud_cover,
            total_precipitation: self.total_precipitation,
            snowfall: self.snowfall,
        };

        row.validate()?;
        Ok(row)
    }
}

/// All rows for one hour of data.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub rows: Vec<WeatherRow>,
}

impl Batch {
    pub fn new(index: usize, rows: Vec<WeatherRow>) -> Self {
        Self { index, rows }
    }

    pub fn empty(index: usize) -> Self {
        Self::new(index, Vec::new())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}

/// CSV timestamps are written with an explicit UTC offset so the server's
/// `TimeZone` setting cannot shift them.
pub mod timestamp_format {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn format(time: &DateTime<Utc>) -> String {
        format!("{}+00", time.format(FORMAT))
    }

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        let naive = value
            .strip_suffix("+00:00")
            .or_else(|| value.strip_suffix("+00"))
            .unwrap_or(value);
        NaiveDateTime::parse_from_str(naive, FORMAT)
            .ok()
            .map(|t| Utc.from_utc_datetime(&t))
    }

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}
