//! Great-circle helpers shared by snapping, stable IDs and the mock engine.

use geo::{HaversineBearing, HaversineDistance, Point};

/// Haversine distance in meters between two (lat, lon) coordinates.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Initial great-circle bearing from start to end, in degrees normalized
/// to [0, 360). North = 0, east = 90.
pub fn azimuth(start_lat: f64, start_lon: f64, end_lat: f64, end_lon: f64) -> f64 {
    let p1 = Point::new(start_lon, start_lat);
    let p2 = Point::new(end_lon, end_lat);
    let bearing = p1.haversine_bearing(p2);
    (bearing % 360.0 + 360.0) % 360.0
}

/// Azimuth rounded to the nearest whole degree. Values just below 360
/// round up to 360 rather than wrapping, matching the canonical-string
/// convention used for stable edge IDs.
pub fn rounded_azimuth(start_lat: f64, start_lon: f64, end_lat: f64, end_lon: f64) -> i64 {
    azimuth(start_lat, start_lon, end_lat, end_lon).round() as i64
}

/// Absolute difference between two headings in degrees, in [0, 180].
pub fn heading_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azimuth_cardinal_directions() {
        // Due east along the equator
        let east = azimuth(0.0, 0.0, 0.0, 1.0);
        assert!((east - 90.0).abs() < 0.5, "east was {east}");

        // Due north
        let north = azimuth(0.0, 0.0, 1.0, 0.0);
        assert!(north < 0.5 || north > 359.5, "north was {north}");

        // Due south
        let south = azimuth(1.0, 0.0, 0.0, 0.0);
        assert!((south - 180.0).abs() < 0.5, "south was {south}");
    }

    #[test]
    fn azimuth_reverses_by_about_180() {
        let fwd = azimuth(38.9664, -94.7083, 38.9592, -94.6917);
        let rev = azimuth(38.9592, -94.6917, 38.9664, -94.7083);
        assert!((heading_delta(fwd, rev) - 180.0).abs() < 1.0);
    }

    #[test]
    fn haversine_known_distance() {
        // ~111 km per degree of latitude
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 500.0, "distance was {d}");
    }

    #[test]
    fn heading_delta_wraps() {
        assert!((heading_delta(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((heading_delta(90.0, 270.0) - 180.0).abs() < 1e-9);
    }
}
