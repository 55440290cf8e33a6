//! Great-circle helpers: haversine distance, polyline length and bearings.
//!
//! Points are `[lon, lat]` pairs in decimal degrees, the same order the
//! geometry arrays use on the wire. All functions are pure; "unknown" is
//! reported as `None` rather than an error.

/// Mean Earth radius used by every distance computation, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A `[lon, lat]` pair in decimal degrees.
pub type Point = [f64; 2];

/// Haversine distance between two positions, in metres.
pub fn distance_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

fn is_valid(point: &Point) -> bool {
    point[0].is_finite() && point[1].is_finite()
}

/// Sums consecutive-pair distances over the finite points of `points`.
///
/// Non-finite points are dropped first. Returns `None` when fewer than two
/// valid points remain.
pub fn polyline_length(points: &[Point]) -> Option<f64> {
    let cleaned: Vec<&Point> = points.iter().filter(|p| is_valid(p)).collect();
    if cleaned.len() < 2 {
        return None;
    }
    let total = cleaned
        .windows(2)
        .map(|pair| distance_meters(pair[0][0], pair[0][1], pair[1][0], pair[1][1]))
        .sum();
    Some(total)
}

/// Initial great-circle bearing from `from` to `to`, in degrees `[0, 360)`.
///
/// Returns `None` for coincident or non-finite points, where no direction
/// exists.
pub fn initial_bearing_deg(from: Point, to: Point) -> Option<f64> {
    if !is_valid(&from) || !is_valid(&to) {
        return None;
    }
    if (from[0] - to[0]).abs() < 1e-12 && (from[1] - to[1]).abs() < 1e-12 {
        return None;
    }
    let phi1 = from[1].to_radians();
    let phi2 = to[1].to_radians();
    let d_lambda = (to[0] - from[0]).to_radians();
    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    Some(y.atan2(x).to_degrees().rem_euclid(360.0))
}

/// Smallest angle between two bearings, in degrees `[0, 180]`.
pub fn bearing_deviation_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Rounds a length to centimetres.
pub fn round_cm(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}
