//! Geodetic helpers.
//!
//! Pure functions shared by the navigator modes and the geofence
//! predictor. Coordinates are WGS84 degrees in `f64`; distances are meters.

use libm::{asin, atan2, cos, sin, sqrt};

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Great-circle distance and initial bearing from one position to another.
///
/// Returns `(distance_m, bearing_rad)` with the bearing in `[-pi, pi]`.
pub fn distance_and_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let sin_dlat = sin(delta_lat / 2.0);
    let sin_dlon = sin(delta_lon / 2.0);
    let a = sin_dlat * sin_dlat + cos(lat1_rad) * cos(lat2_rad) * sin_dlon * sin_dlon;
    let c = 2.0 * atan2(sqrt(a), sqrt(1.0 - a));
    let distance = EARTH_RADIUS_M * c;

    let y = sin(delta_lon) * cos(lat2_rad);
    let x = cos(lat1_rad) * sin(lat2_rad) - sin(lat1_rad) * cos(lat2_rad) * cos(delta_lon);
    let bearing = atan2(y, x);

    (distance, bearing)
}

/// Great-circle distance only.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_and_bearing(lat1, lon1, lat2, lon2).0
}

/// Project a position along a bearing by a distance.
///
/// `bearing` is radians, `dist` meters. Returns `(lat, lon)` degrees.
pub fn waypoint_from_heading_and_distance(
    lat: f64,
    lon: f64,
    bearing: f64,
    dist: f64,
) -> (f64, f64) {
    let lat_rad = lat * DEG_TO_RAD;
    let lon_rad = lon * DEG_TO_RAD;
    let radius_ratio = dist / EARTH_RADIUS_M;

    let target_lat = asin(
        sin(lat_rad) * cos(radius_ratio) + cos(lat_rad) * sin(radius_ratio) * cos(bearing),
    );
    let target_lon = lon_rad
        + atan2(
            sin(bearing) * sin(radius_ratio) * cos(lat_rad),
            cos(radius_ratio) - sin(lat_rad) * sin(target_lat),
        );

    (target_lat * RAD_TO_DEG, target_lon * RAD_TO_DEG)
}

/// Wrap an angle in radians to `[-pi, pi]`.
pub fn wrap_pi(mut angle: f64) -> f64 {
    const TWO_PI: f64 = 2.0 * core::f64::consts::PI;
    while angle > core::f64::consts::PI {
        angle -= TWO_PI;
    }
    while angle < -core::f64::consts::PI {
        angle += TWO_PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude() {
        let (dist, bearing) = distance_and_bearing(35.0, 139.0, 36.0, 139.0);
        assert!((dist - 111_000.0).abs() < 1_000.0);
        assert!(bearing.abs() < 0.02);
    }

    #[test]
    fn bearing_east() {
        let (_, bearing) = distance_and_bearing(35.0, 139.0, 35.0, 140.0);
        assert!((bearing - core::f64::consts::FRAC_PI_2).abs() < 0.02);
    }

    #[test]
    fn projection_round_trip() {
        let (lat, lon) = waypoint_from_heading_and_distance(47.397, 8.545, 0.7, 250.0);
        let (dist, bearing) = distance_and_bearing(47.397, 8.545, lat, lon);
        assert!((dist - 250.0).abs() < 0.5);
        assert!((bearing - 0.7).abs() < 0.01);
    }

    #[test]
    fn projection_zero_distance_is_identity() {
        let (lat, lon) = waypoint_from_heading_and_distance(47.397, 8.545, 1.0, 0.0);
        assert!((lat - 47.397).abs() < 1e-9);
        assert!((lon - 8.545).abs() < 1e-9);
    }

    #[test]
    fn wrap_pi_bounds() {
        assert!((wrap_pi(4.0 * core::f64::consts::PI + 0.5) - 0.5).abs() < 1e-9);
        assert!((wrap_pi(-3.5 * core::f64::consts::PI) - (0.5 * core::f64::consts::PI)).abs() < 1e-9);
    }
}
