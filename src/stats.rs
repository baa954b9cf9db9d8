//! Range statistics and rolling-window speed.
//!
//! [`range_stats`] is the single source of truth for displayed trip
//! statistics. Degenerate inputs (zero duration, zero distance) produce
//! `None` speeds, which displays render as "-".

use serde::{Deserialize, Serialize};

use crate::geo_utils::path_distance_owned;
use crate::{GpsPoint, TimeRange, Trajectory, METERS_PER_NAUTICAL_MILE, MS_PER_HOUR};

/// Windows shorter than this produce no rolling speed (ms).
pub const MIN_ROLLING_WINDOW_MS: i64 = 1000;

/// Half-window used by callers that do not pick their own smoothing scale (ms).
pub const DEFAULT_ROLLING_HALF_WINDOW_MS: i64 = 30_000;

/// Distance, duration and average speed over a time range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RangeStats {
    /// Path distance in meters
    pub distance_meters: f64,
    /// Range duration in milliseconds, never negative
    pub duration_ms: i64,
    /// Average speed in knots, `None` when undefined
    pub avg_speed_knots: Option<f64>,
}

/// Statistics pushed to observers while the playback cursor moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LiveStats {
    /// Stats over the selected range
    pub range: RangeStats,
    /// Current cursor time
    pub current_time: i64,
    /// Interpolated position at the cursor
    pub position: GpsPoint,
    /// Rolling speed around the cursor in knots
    pub rolling_speed_knots: Option<f64>,
}

/// Average speed in knots, `None` if either input is non-positive or non-finite.
pub fn avg_speed_knots(distance_meters: f64, duration_ms: i64) -> Option<f64> {
    if !distance_meters.is_finite() || distance_meters <= 0.0 || duration_ms <= 0 {
        return None;
    }
    let hours = duration_ms as f64 / MS_PER_HOUR;
    let knots = (distance_meters / METERS_PER_NAUTICAL_MILE) / hours;
    knots.is_finite().then_some(knots)
}

/// Statistics over `range`.
///
/// The range is clamped to the trajectory bounds. Distance sums the
/// haversine legs of [`Trajectory::extract_range`]; duration is
/// `end - start` of the clamped range.
///
/// # Example
/// ```
/// use trajectory_engine::{build_trajectory, range_stats, Sample, TimeRange};
///
/// let built = build_trajectory(vec![
///     Sample::timed(35.0, 139.0, 0),
///     Sample::timed(35.0, 139.1, 10_000),
/// ]).unwrap();
/// let traj = built.as_timed().unwrap();
/// let stats = range_stats(traj, TimeRange::new(0, 10_000));
/// assert!(stats.distance_meters > 9_000.0);
/// ```
pub fn range_stats(trajectory: &Trajectory, range: TimeRange) -> RangeStats {
    let range = range.clamp_to(&trajectory.time_bounds());
    let distance_meters = path_distance_owned(trajectory.extract_range(range));
    let duration_ms = range.duration_ms();
    RangeStats {
        distance_meters,
        duration_ms,
        avg_speed_knots: avg_speed_knots(distance_meters, duration_ms),
    }
}

/// Speed over `[center - half_window, center + half_window]`, clamped to the
/// trajectory bounds.
///
/// Returns `None` when the clamped window is shorter than
/// [`MIN_ROLLING_WINDOW_MS`], which happens near the trajectory edges.
pub fn rolling_speed(trajectory: &Trajectory, center: i64, half_window_ms: i64) -> Option<f64> {
    let half = half_window_ms.max(0);
    let window = TimeRange::new(center.saturating_sub(half), center.saturating_add(half))
        .clamp_to(&trajectory.time_bounds());
    if window.duration_ms() < MIN_ROLLING_WINDOW_MS {
        return None;
    }
    range_stats(trajectory, window).avg_speed_knots
}

/// Range stats plus cursor position and rolling speed at `current_time`.
pub fn live_stats(
    trajectory: &Trajectory,
    range: TimeRange,
    current_time: i64,
    half_window_ms: i64,
) -> LiveStats {
    LiveStats {
        range: range_stats(trajectory, range),
        current_time,
        position: trajectory.position_at_time(current_time),
        rolling_speed_knots: rolling_speed(trajectory, current_time, half_window_ms),
    }
}
