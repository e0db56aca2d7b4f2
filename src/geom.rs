//! Flat-earth geometry helpers shared by the nearest-point query and the
//! point reducer, so both agree on what "close" means.

/// Meters per degree of latitude.
const ONE_DEGREE: f64 = 111_319.9;

/// Flat 2-D distance in meters between two coordinates.
///
/// A planar approximation, not great-circle: the longitude delta is scaled
/// by the cosine of the first latitude. Good enough for the short-range
/// comparisons the query and reducer make.
pub fn distance_2d(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat1 - lat2) * ONE_DEGREE;
    let d_lon = (lon1 - lon2) * ONE_DEGREE * lat1.to_radians().cos();
    (d_lat * d_lat + d_lon * d_lon).sqrt()
}

/// Initial bearing in degrees from the first coordinate to the second,
/// normalized to 0..360.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Distance in meters from a point to the chord between two neighbors.
///
/// The projection parameter is clamped to the chord, so a point "behind"
/// either endpoint measures its distance to that endpoint. Degenerate
/// chords fall back to plain point distance.
pub fn point_segment_distance(
    (lat, lon): (f64, f64),
    (a_lat, a_lon): (f64, f64),
    (b_lat, b_lon): (f64, f64),
) -> f64 {
    let ab_lat = b_lat - a_lat;
    let ab_lon = b_lon - a_lon;
    let ap_lat = lat - a_lat;
    let ap_lon = lon - a_lon;

    let len_sq = ab_lat * ab_lat + ab_lon * ab_lon;
    let t = if len_sq > 0.0 {
        ((ap_lat * ab_lat + ap_lon * ab_lon) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    distance_2d(lat, lon, a_lat + t * ab_lat, a_lon + t * ab_lon)
}
