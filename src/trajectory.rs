//! Immutable, queryable trajectory over a sample set.
//!
//! [`build_trajectory`] returns a tagged [`BuiltTrajectory`]: either a timed
//! [`Trajectory`] supporting interpolation, snapping and range extraction, or
//! an [`UntimedTrajectory`] that only offers the static path. Callers have to
//! match on the variant before using time-based operations.

use log::{debug, info};

use crate::geo_utils::{compute_bounds, path_distance};
use crate::{Bounds, GpsPoint, OptionExt, Result, Sample, TimeIndex, TimeRange, TrajectoryError};

/// Result of building a trajectory from raw samples.
#[derive(Debug, Clone)]
pub enum BuiltTrajectory {
    Timed(Trajectory),
    Untimed(UntimedTrajectory),
}

/// Build a trajectory from samples in original file order.
///
/// Samples with non-finite coordinates are dropped. Returns
/// [`TrajectoryError::EmptyTrajectory`] when nothing usable remains, and the
/// untimed variant when no remaining sample has a timestamp.
///
/// # Example
/// ```
/// use trajectory_engine::{build_trajectory, BuiltTrajectory, Sample};
///
/// let built = build_trajectory(vec![Sample::untimed(35.0, 139.0)]).unwrap();
/// assert!(matches!(built, BuiltTrajectory::Untimed(_)));
/// assert!(built.position_at_time(0).is_err());
/// ```
pub fn build_trajectory(samples: Vec<Sample>) -> Result<BuiltTrajectory> {
    let valid: Vec<&Sample> = samples.iter().filter(|s| s.point.is_valid()).collect();
    let dropped = samples.len() - valid.len();
    if dropped > 0 {
        debug!(
            "[Trajectory] Dropped {} samples with non-finite coordinates",
            dropped
        );
    }

    if valid.is_empty() {
        return Err(TrajectoryError::EmptyTrajectory { dropped });
    }

    let points: Vec<GpsPoint> = valid.iter().map(|s| s.point).collect();
    let point_times: Vec<Option<i64>> = valid.iter().map(|s| s.time_ms).collect();

    // Built over the unfiltered input so indices address the caller's array
    let index = TimeIndex::build(&samples);
    let sorted_points: Vec<GpsPoint> =
        index.indices().iter().map(|&i| samples[i].point).collect();

    if index.is_empty() {
        info!(
            "[Trajectory] Built untimed trajectory with {} points",
            points.len()
        );
        return Ok(BuiltTrajectory::Untimed(UntimedTrajectory { points }));
    }

    info!(
        "[Trajectory] Built trajectory: {} points, {} timed",
        points.len(),
        index.len()
    );
    Ok(BuiltTrajectory::Timed(Trajectory {
        points,
        point_times,
        sorted_points,
        index,
    }))
}

impl BuiltTrajectory {
    pub fn is_timed(&self) -> bool {
        matches!(self, BuiltTrajectory::Timed(_))
    }

    /// The timed trajectory, if this is one.
    pub fn as_timed(&self) -> Option<&Trajectory> {
        match self {
            BuiltTrajectory::Timed(t) => Some(t),
            BuiltTrajectory::Untimed(_) => None,
        }
    }

    /// All positions in original file order.
    pub fn points(&self) -> &[GpsPoint] {
        match self {
            BuiltTrajectory::Timed(t) => t.points(),
            BuiltTrajectory::Untimed(u) => u.points(),
        }
    }

    /// Length of the static path in original file order (meters).
    pub fn total_distance(&self) -> f64 {
        path_distance(self.points())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        compute_bounds(self.points())
    }

    /// Position at `t`, rejected on an untimed trajectory.
    pub fn position_at_time(&self, t: i64) -> Result<GpsPoint> {
        self.as_timed()
            .map(|traj| traj.position_at_time(t))
            .ok_or_untimed("position_at_time")
    }

    /// Path over a time range.
    ///
    /// `None` means the whole path: the full time range for a timed
    /// trajectory, every position in file order for an untimed one. An
    /// explicit range on an untimed trajectory is rejected.
    pub fn extract_range(&self, range: Option<TimeRange>) -> Result<Vec<GpsPoint>> {
        match (self, range) {
            (BuiltTrajectory::Timed(t), Some(r)) => Ok(t.extract_range(r).collect()),
            (BuiltTrajectory::Timed(t), None) => Ok(t.extract_range(t.time_bounds()).collect()),
            (BuiltTrajectory::Untimed(u), None) => Ok(u.whole_path().collect()),
            (BuiltTrajectory::Untimed(_), Some(_)) => Err(TrajectoryError::Untimed {
                operation: "extract_range".to_string(),
            }),
        }
    }
}

/// A trajectory without any resolvable timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct UntimedTrajectory {
    points: Vec<GpsPoint>,
}

impl UntimedTrajectory {
    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: empty inputs never build a trajectory.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_distance(&self) -> f64 {
        path_distance(&self.points)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        compute_bounds(&self.points)
    }

    /// Every position in original file order.
    pub fn whole_path(&self) -> impl Iterator<Item = GpsPoint> + Clone + '_ {
        self.points.iter().copied()
    }
}

/// A timed trajectory: positions plus a sorted time index.
///
/// Immutable once built; loading a new track builds a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Valid positions in file order
    points: Vec<GpsPoint>,
    point_times: Vec<Option<i64>>,
    /// Positions parallel to `index.times()`
    sorted_points: Vec<GpsPoint>,
    /// Indices refer to the samples passed to [`build_trajectory`]
    index: TimeIndex,
}

impl Trajectory {
    /// All valid positions in original file order.
    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn time_index(&self) -> &TimeIndex {
        &self.index
    }

    /// `[first, last]` timestamps of the trajectory.
    pub fn time_bounds(&self) -> TimeRange {
        // Non-empty by construction
        let times = self.index.times();
        TimeRange::new(times[0], times[times.len() - 1])
    }

    /// Length of the static path in original file order (meters).
    pub fn total_distance(&self) -> f64 {
        path_distance(&self.points)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        compute_bounds(&self.points)
    }

    /// Every valid sample in original file order, untimed ones included.
    pub fn file_order_samples(
        &self,
    ) -> impl Iterator<Item = (Option<i64>, GpsPoint)> + Clone + '_ {
        self.point_times.iter().copied().zip(self.points.iter().copied())
    }

    /// Timed samples in timestamp order.
    pub fn timed_samples(&self) -> impl Iterator<Item = (i64, GpsPoint)> + Clone + '_ {
        self.index
            .times()
            .iter()
            .copied()
            .zip(self.sorted_points.iter().copied())
    }

    /// Position at sorted-index position `k`.
    fn point_at_sorted(&self, k: usize) -> GpsPoint {
        self.sorted_points[k]
    }

    /// Continuous position at `t` by clamped linear interpolation.
    ///
    /// Latitude and longitude are interpolated independently. Queries before
    /// the first or after the last timestamp return the end positions; a
    /// non-positive gap between the bracketing samples returns the earlier one.
    pub fn position_at_time(&self, t: i64) -> GpsPoint {
        let times = self.index.times();
        let last = times.len() - 1;
        if t <= times[0] {
            return self.point_at_sorted(0);
        }
        if t >= times[last] {
            return self.point_at_sorted(last);
        }

        let (lo, hi) = self.index.bracket(t);
        let (t0, t1) = (times[lo], times[hi]);
        let p0 = self.point_at_sorted(lo);
        let denom = t1.saturating_sub(t0);
        if denom <= 0 {
            return p0;
        }
        let ratio = (t.saturating_sub(t0) as f64 / denom as f64).clamp(0.0, 1.0);
        p0.lerp(&self.point_at_sorted(hi), ratio)
    }

    /// Sorted-index position of the sample nearest `t`.
    pub fn closest_index(&self, t: i64) -> usize {
        self.index.closest_index(t)
    }

    /// Timestamp of the sample nearest `t`.
    pub fn snap_time(&self, t: i64) -> i64 {
        self.index.times()[self.closest_index(t)]
    }

    /// Index into the input samples and position of the sample nearest `t`.
    ///
    /// The index counts dropped samples too, so it addresses the array
    /// handed to [`build_trajectory`].
    pub fn closest_sample(&self, t: i64) -> (usize, GpsPoint) {
        let k = self.closest_index(t);
        (self.index.indices()[k], self.sorted_points[k])
    }

    /// Canonical path over a time window.
    ///
    /// Yields the interpolated position at `range.start`, each timed sample
    /// inside `[start, end]` in timestamp order, then the interpolated
    /// position at `range.end`. The range is clamped to the trajectory first.
    pub fn extract_range(&self, range: TimeRange) -> RangePath<'_> {
        let range = range.clamp_to(&self.time_bounds());
        let times = self.index.times();
        let first = times.partition_point(|&t| t < range.start);
        let end = times.partition_point(|&t| t <= range.end);
        RangePath {
            trajectory: self,
            range,
            next: first,
            end,
            stage: Stage::Start,
        }
    }

    /// Trailing window ending at `current`, never reaching before `floor`.
    ///
    /// Used for the "recent trail" overlay that follows the playback cursor.
    pub fn recent_trail(&self, current: i64, window_ms: i64, floor: i64) -> RangePath<'_> {
        let start = floor.max(current.saturating_sub(window_ms.max(0)));
        self.extract_range(TimeRange::new(start.min(current), current))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Start,
    Samples,
    End,
    Done,
}

/// Lazy, finite, restartable path over a time range.
///
/// Clone the iterator (or call [`Trajectory::extract_range`] again) to
/// traverse the same path twice.
#[derive(Debug, Clone)]
pub struct RangePath<'a> {
    trajectory: &'a Trajectory,
    range: TimeRange,
    next: usize,
    end: usize,
    stage: Stage,
}

impl RangePath<'_> {
    /// The clamped range this path covers.
    pub fn range(&self) -> TimeRange {
        self.range
    }
}

impl Iterator for RangePath<'_> {
    type Item = GpsPoint;

    fn next(&mut self) -> Option<GpsPoint> {
        loop {
            match self.stage {
                Stage::Start => {
                    self.stage = Stage::Samples;
                    return Some(self.trajectory.position_at_time(self.range.start));
                }
                Stage::Samples => {
                    if self.next < self.end {
                        let p = self.trajectory.point_at_sorted(self.next);
                        self.next += 1;
                        return Some(p);
                    }
                    self.stage = Stage::End;
                }
                Stage::End => {
                    self.stage = Stage::Done;
                    return Some(self.trajectory.position_at_time(self.range.end));
                }
                Stage::Done => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let samples = self.end.saturating_sub(self.next);
        let n = match self.stage {
            Stage::Start => samples + 2,
            Stage::Samples => samples + 1,
            Stage::End => 1,
            Stage::Done => 0,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for RangePath<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(samples: Vec<Sample>) -> Trajectory {
        match build_trajectory(samples).unwrap() {
            BuiltTrajectory::Timed(t) => t,
            BuiltTrajectory::Untimed(_) => panic!("expected timed trajectory"),
        }
    }

    fn straight_track() -> Trajectory {
        timed(vec![
            Sample::timed(35.0, 139.0, 0),
            Sample::timed(35.0, 139.1, 10_000),
            Sample::timed(35.1, 139.1, 20_000),
        ])
    }

    #[test]
    fn test_build_empty_fails() {
        let err = build_trajectory(vec![]).unwrap_err();
        assert_eq!(err, TrajectoryError::EmptyTrajectory { dropped: 0 });

        let err = build_trajectory(vec![Sample::timed(f64::NAN, 0.0, 0)]).unwrap_err();
        assert_eq!(err, TrajectoryError::EmptyTrajectory { dropped: 1 });
    }

    #[test]
    fn test_build_untimed() {
        let built = build_trajectory(vec![
            Sample::untimed(35.0, 139.0),
            Sample::untimed(35.1, 139.1),
            Sample::timed(f64::NAN, 139.2, 1000),
        ])
        .unwrap();
        assert!(!built.is_timed());
        assert!(matches!(
            built.position_at_time(0),
            Err(TrajectoryError::Untimed { .. })
        ));
        let path = built.extract_range(None).unwrap();
        assert_eq!(
            path,
            vec![GpsPoint::new(35.0, 139.0), GpsPoint::new(35.1, 139.1)]
        );
        assert!(built.extract_range(Some(TimeRange::new(0, 1))).is_err());
        assert!(built.total_distance() > 0.0);
    }

    #[test]
    fn test_position_at_known_timestamps_is_exact() {
        let traj = straight_track();
        assert_eq!(traj.position_at_time(0), GpsPoint::new(35.0, 139.0));
        assert_eq!(traj.position_at_time(10_000), GpsPoint::new(35.0, 139.1));
        assert_eq!(traj.position_at_time(20_000), GpsPoint::new(35.1, 139.1));
    }

    #[test]
    fn test_position_clamps_outside_bounds() {
        let traj = straight_track();
        assert_eq!(traj.position_at_time(-5_000), GpsPoint::new(35.0, 139.0));
        assert_eq!(traj.position_at_time(99_000), GpsPoint::new(35.1, 139.1));
    }

    #[test]
    fn test_position_midpoint_is_linear() {
        let traj = straight_track();
        let mid = traj.position_at_time(5_000);
        let expected = GpsPoint::new(35.0, 139.0).lerp(&GpsPoint::new(35.0, 139.1), 0.5);
        assert_eq!(mid, expected);
    }

    #[test]
    fn test_position_duplicate_timestamps() {
        let traj = timed(vec![
            Sample::timed(35.0, 139.0, 0),
            Sample::timed(35.5, 139.5, 1000),
            Sample::timed(36.0, 140.0, 1000),
            Sample::timed(37.0, 141.0, 2000),
        ]);
        let p = traj.position_at_time(1500);
        // Interpolates from the later duplicate
        assert!((p.latitude - 36.5).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_input_uses_time_order() {
        let traj = timed(vec![
            Sample::timed(35.2, 139.2, 20_000),
            Sample::untimed(0.0, 0.0),
            Sample::timed(35.0, 139.0, 0),
            Sample::timed(35.1, 139.1, 10_000),
        ]);
        assert_eq!(traj.time_bounds(), TimeRange::new(0, 20_000));
        let p = traj.position_at_time(15_000);
        assert!((p.latitude - 35.15).abs() < 1e-12);
        assert_eq!(traj.closest_sample(19_000), (0, GpsPoint::new(35.2, 139.2)));
    }

    #[test]
    fn test_extract_range_shape() {
        let traj = straight_track();
        let path: Vec<GpsPoint> = traj.extract_range(TimeRange::new(5_000, 15_000)).collect();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], traj.position_at_time(5_000));
        assert_eq!(path[1], GpsPoint::new(35.0, 139.1));
        assert_eq!(path[2], traj.position_at_time(15_000));
    }

    #[test]
    fn test_extract_range_inclusive_and_clamped() {
        let traj = straight_track();
        let path: Vec<GpsPoint> = traj
            .extract_range(TimeRange::new(-1_000, 50_000))
            .collect();
        // start + 3 samples + end
        assert_eq!(path.len(), 5);
        assert_eq!(path[0], path[1]);
        assert_eq!(path[3], path[4]);
    }

    #[test]
    fn test_extract_range_is_restartable() {
        let traj = straight_track();
        let range = TimeRange::new(2_000, 18_000);
        let iter = traj.extract_range(range);
        assert_eq!(iter.len(), 3);
        let a: Vec<GpsPoint> = iter.clone().collect();
        let b: Vec<GpsPoint> = iter.collect();
        let c: Vec<GpsPoint> = traj.extract_range(range).collect();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_snap_time() {
        let traj = straight_track();
        assert_eq!(traj.snap_time(4_000), 0);
        assert_eq!(traj.snap_time(6_000), 10_000);
        assert_eq!(traj.snap_time(5_000), 0);
    }

    #[test]
    fn test_indices_address_input_after_dropped_samples() {
        let traj = timed(vec![
            Sample::timed(f64::NAN, 139.0, 0),
            Sample::timed(35.0, 139.0, 1000),
            Sample::timed(35.1, 139.1, 2000),
        ]);
        assert_eq!(traj.time_index().indices(), &[1, 2]);
        assert_eq!(traj.closest_sample(2000), (2, GpsPoint::new(35.1, 139.1)));
        assert_eq!(traj.closest_sample(0), (1, GpsPoint::new(35.0, 139.0)));
        assert_eq!(traj.position_at_time(2000), GpsPoint::new(35.1, 139.1));
        assert_eq!(traj.points().len(), 2);
    }

    #[test]
    fn test_extreme_timestamps() {
        let traj = timed(vec![
            Sample::timed(35.0, 139.0, i64::MIN),
            Sample::timed(35.1, 139.1, 0),
            Sample::timed(35.2, 139.2, i64::MAX),
        ]);
        let bounds = traj.time_bounds();
        assert_eq!(bounds, TimeRange::new(i64::MIN, i64::MAX));
        assert_eq!(bounds.duration_ms(), i64::MAX);

        assert!((traj.position_at_time(-1).latitude - 35.1).abs() < 1e-9);
        assert!((traj.position_at_time(1).latitude - 35.1).abs() < 1e-9);
        assert_eq!(traj.closest_index(i64::MIN + 1), 0);
        assert_eq!(traj.snap_time(i64::MAX - 1), i64::MAX);

        let stats = crate::range_stats(&traj, bounds);
        assert_eq!(stats.duration_ms, i64::MAX);
        assert!(stats.distance_meters > 0.0);
        assert_eq!(traj.extract_range(bounds).count(), 5);

        let trail = traj.recent_trail(i64::MIN, 60_000, i64::MIN);
        assert_eq!(trail.range(), TimeRange::new(i64::MIN, i64::MIN));
    }

    #[test]
    fn test_recent_trail_respects_floor() {
        let traj = straight_track();
        let trail = traj.recent_trail(15_000, 60_000, 8_000);
        assert_eq!(trail.range(), TimeRange::new(8_000, 15_000));

        let trail = traj.recent_trail(15_000, 0, 0);
        let points: Vec<GpsPoint> = trail.collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], points[1]);
    }
}
