// src/telemetry/geo.rs
//! Great-circle helpers

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per second to kilometers per hour
pub const MPS_TO_KMH: f64 = 3.6;

/// Haversine distance in meters between two (latitude, longitude) pairs in degrees
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Average speed in km/h for `distance_m` covered in `dt_s` seconds.
/// A non-positive interval counts as one second.
pub fn speed_kmh(distance_m: f64, dt_s: f64) -> f64 {
    let dt = if dt_s > 0.0 { dt_s } else { 1.0 };
    distance_m / dt * MPS_TO_KMH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(haversine_m((0.0, 0.0), (0.0, 0.0)), 0.0);
        assert_eq!(haversine_m((48.1173, 11.5167), (48.1173, 11.5167)), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = (42.438878, -71.119277);
        let b = (40.712776, -74.005974);
        assert_eq!(haversine_m(a, b), haversine_m(b, a));
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = haversine_m((0.0, 0.0), (0.0, 1.0));
        // 2 * pi * R / 360
        assert!((d - 111_194.93).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_speed_from_distance() {
        assert_eq!(speed_kmh(10.0, 1.0), 36.0);
        assert_eq!(speed_kmh(10.0, 0.0), 36.0);
        assert_eq!(speed_kmh(10.0, -3.0), 36.0);
        assert_eq!(speed_kmh(100.0, 10.0), 36.0);
    }
}
