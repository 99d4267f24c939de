//! Fixed-point coordinates, distances and bearings.
//!
//! Coordinates arrive from the upstream conversion stage already quantized to
//! 1e-7 degrees; everything in the graph keeps that representation. The
//! boundary-node records of the tile format store 24-bit map units
//! (`degrees * 2^24 / 360`) instead, which is the device's native grid.

use serde::{Deserialize, Serialize};

/// 1e-7 degrees per unit.
pub const SCALE: f64 = 1e7;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A fixed-point geographic point (1e-7 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub lat: i32,
    pub lon: i32,
}

impl Coord {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            lat: (lat_deg * SCALE).round() as i32,
            lon: (lon_deg * SCALE).round() as i32,
        }
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / SCALE
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / SCALE
    }

    /// Latitude in 24-bit map units, the device's native grid.
    pub fn lat_map_units(&self) -> u32 {
        to_map_units(self.lat_degrees())
    }

    /// Longitude in 24-bit map units.
    pub fn lon_map_units(&self) -> u32 {
        to_map_units(self.lon_degrees())
    }

    /// Haversine distance to another point in meters.
    pub fn distance(&self, other: &Coord) -> f64 {
        haversine_distance(
            self.lat_degrees(),
            self.lon_degrees(),
            other.lat_degrees(),
            other.lon_degrees(),
        )
    }

    /// Initial great-circle bearing towards another point, degrees in
    /// (-180, 180], 0 = North.
    pub fn bearing_to(&self, other: &Coord) -> f64 {
        bearing(
            self.lat_degrees(),
            self.lon_degrees(),
            other.lat_degrees(),
            other.lon_degrees(),
        )
    }
}

/// Compute haversine distance between two points in meters.
pub fn haversine_distance(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let delta_lat = (lat2_deg - lat1_deg).to_radians();
    let delta_lon = (lon2_deg - lon1_deg).to_radians();

    let a =
        (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Compute the bearing from point 1 to point 2, degrees in (-180, 180].
pub fn bearing(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let delta_lon = (lon2_deg - lon1_deg).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    normalize_heading(y.atan2(x).to_degrees())
}

/// Wrap a heading in degrees to (-180, 180].
pub fn normalize_heading(mut deg: f64) -> f64 {
    while deg > 180.0 {
        deg -= 360.0;
    }
    while deg <= -180.0 {
        deg += 360.0;
    }
    deg
}

/// The heading of the opposite travel direction.
pub fn reverse_heading(deg: f64) -> f64 {
    normalize_heading(deg + 180.0)
}

/// Encode a heading as the device's 256-step representation (1.40625°/unit),
/// two's complement.
pub fn heading_to_byte(deg: f64) -> i8 {
    let units = (deg * 256.0 / 360.0).round() as i32;
    // 180° rounds to 128, which wraps to -128 (the same direction).
    (units.rem_euclid(256) as u8) as i8
}

/// Convert degrees to 24-bit map units.
pub fn to_map_units(deg: f64) -> u32 {
    let units = (deg * (1 << 24) as f64 / 360.0).round() as i64;
    (units.rem_euclid(1 << 24)) as u32
}
