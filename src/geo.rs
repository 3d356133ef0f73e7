//! Great-circle distance helpers

use crate::types::LocationSample;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates, in kilometers.
///
/// Identical points yield exactly zero. The arcsine argument is clamped to
/// [-1, 1] so rounding at near-identical or antipodal inputs never yields NaN.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().clamp(-1.0, 1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Distance between two recorded samples, in kilometers
pub fn sample_distance_km(from: &LocationSample, to: &LocationSample) -> f64 {
    distance_km(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Total length of a path, summed over consecutive samples
pub fn path_length_km(samples: &[LocationSample]) -> f64 {
    samples
        .windows(2)
        .map(|w| sample_distance_km(&w[0], &w[1]))
        .sum()
}
