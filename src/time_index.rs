//! Sorted time axis over the timed subset of a sample array.
//!
//! Samples arrive in file order, which may be unsorted, non-monotonic or
//! missing timestamps. The index keeps only samples with a timestamp and
//! finite coordinates, paired with their original position, sorted by time.

use crate::{Sample, TimeRange};

/// Parallel arrays of sorted timestamps and original sample indices.
///
/// Invariant: `times` is non-decreasing and `times.len() == indices.len()`.
/// Ties keep their original relative order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeIndex {
    times: Vec<i64>,
    indices: Vec<usize>,
}

impl TimeIndex {
    /// Build the index from samples in original order. O(n log n).
    pub fn build(samples: &[Sample]) -> Self {
        let mut entries: Vec<(i64, usize)> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.point.is_valid())
            .filter_map(|(i, s)| s.time_ms.map(|t| (t, i)))
            .collect();

        // sort_by_key is stable, so equal timestamps keep file order
        entries.sort_by_key(|&(t, _)| t);

        let (times, indices) = entries.into_iter().unzip();
        Self { times, indices }
    }

    /// Sorted timestamps.
    pub fn times(&self) -> &[i64] {
        &self.times
    }

    /// Original sample index for each sorted timestamp.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// An empty index signals an untimed trajectory.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first(&self) -> Option<i64> {
        self.times.first().copied()
    }

    pub fn last(&self) -> Option<i64> {
        self.times.last().copied()
    }

    /// `[first, last]`, or `None` when empty.
    pub fn bounds(&self) -> Option<TimeRange> {
        Some(TimeRange::new(self.first()?, self.last()?))
    }

    /// Index of the timestamp nearest `query`. See [`closest_index`].
    pub fn closest_index(&self, query: i64) -> usize {
        closest_index(&self.times, query)
    }

    /// Bracketing pair `(lo, hi)` for interpolation at `t`.
    ///
    /// `lo` is the last position with `times[lo] <= t` and `hi = lo + 1`.
    /// Only meaningful for `first < t < last` with at least two entries;
    /// callers handle the clamped ends themselves.
    pub(crate) fn bracket(&self, t: i64) -> (usize, usize) {
        let upper = self.times.partition_point(|&x| x <= t);
        let lo = upper.saturating_sub(1).min(self.times.len().saturating_sub(2));
        (lo, lo + 1)
    }
}

/// Binary search for the index of the timestamp nearest `query`.
///
/// Ties (equal distance on both sides) resolve to the earlier index.
/// Queries at or below the first timestamp return 0; at or above the last,
/// the last index. An empty slice returns 0. O(log n).
pub fn closest_index(times: &[i64], query: i64) -> usize {
    let Some(&last) = times.last() else {
        return 0;
    };
    let hi = times.len() - 1;
    if hi == 0 || query <= times[0] {
        return 0;
    }
    if query >= last {
        return hi;
    }

    // First entry >= query; 1..=hi given the checks above
    let after = times.partition_point(|&t| t < query);
    if times[after] == query {
        // partition_point lands on the first of any run of equal timestamps
        return after;
    }
    let before = after - 1;
    if times[after].abs_diff(query) < query.abs_diff(times[before]) {
        after
    } else {
        before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Sample> {
        vec![
            Sample::timed(35.0, 139.0, 3000),
            Sample::untimed(35.1, 139.1),
            Sample::timed(35.2, 139.2, 1000),
            Sample::timed(f64::NAN, 139.3, 500),
            Sample::timed(35.4, 139.4, 2000),
            Sample::timed(35.5, 139.5, 1000),
        ]
    }

    #[test]
    fn test_build_sorts_and_filters() {
        let index = TimeIndex::build(&samples());
        assert_eq!(index.times(), &[1000, 1000, 2000, 3000]);
        // Ties keep original order: sample 2 before sample 5
        assert_eq!(index.indices(), &[2, 5, 4, 0]);
        assert_eq!(index.bounds(), Some(TimeRange::new(1000, 3000)));
    }

    #[test]
    fn test_build_untimed_is_empty() {
        let index = TimeIndex::build(&[Sample::untimed(0.0, 0.0), Sample::untimed(1.0, 1.0)]);
        assert!(index.is_empty());
        assert_eq!(index.times().len(), index.indices().len());
        assert!(index.bounds().is_none());
    }

    #[test]
    fn test_closest_index_boundaries() {
        let times = [100, 200, 300, 400];
        assert_eq!(closest_index(&times, -5), 0);
        assert_eq!(closest_index(&times, 100), 0);
        assert_eq!(closest_index(&times, 400), 3);
        assert_eq!(closest_index(&times, 10_000), 3);
        assert_eq!(closest_index(&[], 50), 0);
        assert_eq!(closest_index(&[42], 50), 0);
    }

    #[test]
    fn test_closest_index_nearest_and_ties() {
        let times = [100, 200, 300, 400];
        assert_eq!(closest_index(&times, 240), 1);
        assert_eq!(closest_index(&times, 260), 2);
        // Equidistant resolves to the earlier index
        assert_eq!(closest_index(&times, 250), 1);
        assert_eq!(closest_index(&times, 300), 2);
    }

    #[test]
    fn test_closest_index_duplicate_timestamps() {
        let times = [100, 200, 200, 200, 300];
        assert_eq!(closest_index(&times, 200), 1);
        assert_eq!(closest_index(&times, 210), 3);
    }

    #[test]
    fn test_closest_index_extreme_timestamps() {
        let times = [i64::MIN, 0, i64::MAX];
        assert_eq!(closest_index(&times, i64::MIN + 1), 0);
        assert_eq!(closest_index(&times, -1), 1);
        assert_eq!(closest_index(&times, 1), 1);
        assert_eq!(closest_index(&times, i64::MAX - 1), 2);
    }

    #[test]
    fn test_indices_count_filtered_samples() {
        let index = TimeIndex::build(&[
            Sample::timed(f64::NAN, 139.0, 0),
            Sample::timed(35.0, 139.0, 1000),
            Sample::timed(35.1, 139.1, 2000),
        ]);
        assert_eq!(index.times(), &[1000, 2000]);
        assert_eq!(index.indices(), &[1, 2]);
    }

    #[test]
    fn test_bracket() {
        let index = TimeIndex::build(&[
            Sample::timed(0.0, 0.0, 0),
            Sample::timed(0.0, 1.0, 10),
            Sample::timed(0.0, 2.0, 20),
        ]);
        assert_eq!(index.bracket(5), (0, 1));
        assert_eq!(index.bracket(10), (1, 2));
        assert_eq!(index.bracket(15), (1, 2));
    }
}
