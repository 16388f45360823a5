//! Great-circle distance between geographic points
//!
//! Distances are in meters. Altitude is ignored.

use crate::model::Position;

/// Mean Earth radius (IUGG), meters
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in meters between two positions
pub fn haversine_meters(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude_degrees.to_radians();
    let lat2 = b.latitude_degrees.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude_degrees - a.longitude_degrees).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_MEAN_RADIUS_M * h.sqrt().asin()
}
