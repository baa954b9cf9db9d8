//! Geographic utilities: great-circle distance, path length and conversions
//! into `geo` primitives for renderers.

use geo::{BoundingRect, Coord, LineString};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius used by every distance in the engine (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points using the haversine formula.
///
/// Returns `f64::NAN` when any coordinate is non-finite. Never panics.
///
/// # Example
/// ```
/// use trajectory_engine::GpsPoint;
/// use trajectory_engine::geo_utils::haversine_distance;
///
/// let tokyo = GpsPoint::new(35.681236, 139.767125);
/// let yokohama = GpsPoint::new(35.443708, 139.638026);
/// let d = haversine_distance(&tokyo, &yokohama);
/// assert!(d > 25_000.0 && d < 30_000.0);
/// ```
pub fn haversine_distance(a: &GpsPoint, b: &GpsPoint) -> f64 {
    distance_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Haversine distance for raw (lat, lon) pairs in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if !(lat1.is_finite() && lon1.is_finite() && lat2.is_finite() && lon2.is_finite()) {
        return f64::NAN;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let s = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * s.sqrt().atan2((1.0 - s).sqrt());
    EARTH_RADIUS_M * c
}

/// Total distance along consecutive points in meters.
///
/// Legs whose distance is not finite are skipped rather than poisoning the sum.
pub fn path_distance<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a GpsPoint>,
{
    path_distance_owned(points.into_iter().copied())
}

/// Same as [`path_distance`] for an owned-point iterator (e.g. a range path).
pub fn path_distance_owned<I>(points: I) -> f64
where
    I: IntoIterator<Item = GpsPoint>,
{
    let mut total = 0.0;
    let mut prev: Option<GpsPoint> = None;
    for p in points {
        if let Some(q) = prev {
            let d = haversine_distance(&q, &p);
            if d.is_finite() {
                total += d;
            }
        }
        prev = Some(p);
    }
    total
}

/// Convert points into a `geo::LineString` (x = longitude, y = latitude).
pub fn to_line_string(points: &[GpsPoint]) -> LineString<f64> {
    LineString::new(
        points
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect(),
    )
}

/// Bounding box of a set of points, `None` when empty.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    to_line_string(points).bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}
