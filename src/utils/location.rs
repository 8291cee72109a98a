use crate::error::{BenchError, Result};
use crate::utils::constants::{GRID_LONGITUDES, GRID_RESOLUTION, MIN_LATITUDE, MIN_LONGITUDE};

/// Map a grid coordinate to its 1-based location id.
///
/// Ids are row-major over the 0.25° grid starting at (-90, -179.75).
///
/// # Examples
/// ```
/// use weather_load_bench::utils::latlon_to_location_id;
///
/// assert_eq!(latlon_to_location_id(-90.0, -179.75).unwrap(), 1);
/// assert_eq!(latlon_to_location_id(-90.0, -179.5).unwrap(), 2);
/// ```
pub fn latlon_to_location_id(latitude: f32, longitude: f32) -> Result<i32> {
    if !(MIN_LATITUDE..=90.0).contains(&latitude) || !(MIN_LONGITUDE..=180.0).contains(&longitude)
    {
        return Err(BenchError::InvalidFormat(format!(
            "(lat, lon) = ({}, {}) is not a valid location",
            latitude, longitude
        )));
    }

    let lat_index = ((latitude - MIN_LATITUDE) / GRID_RESOLUTION) as usize;
    let lon_index = ((longitude - MIN_LONGITUDE) / GRID_RESOLUTION) as usize;
    Ok((lat_index * GRID_LONGITUDES + lon_index + 1) as i32)
}

/// Convert a 0..360 east longitude to -180..180.
pub fn normalize_longitude(longitude_east: f32) -> f32 {
    if longitude_east > 180.0 {
        longitude_east - 360.0
    } else {
        longitude_east
    }
}
