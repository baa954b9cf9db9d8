//! Speed-based path segmentation for rendering.
//!
//! Each segment between consecutive samples gets a speed in knots and is
//! classified into one of `bin_count` bins through a non-linear emphasis
//! mapping: the low-speed regime (0..cutoff knots) takes the lower
//! `low_speed_share` of the normalized range, speeds between the cutoff and
//! an adaptive ceiling take the rest. Adjacent segments in the same bin are
//! merged into a single polyline run.
//!
//! ## Example
//! ```rust
//! use trajectory_engine::{build_trajectory, segment_by_speed, Sample, SegmentConfig};
//!
//! let built = build_trajectory(vec![
//!     Sample::timed(35.0, 139.0, 0),
//!     Sample::timed(35.0, 139.0001, 10_000),
//!     Sample::timed(35.0, 139.0002, 20_000),
//! ]).unwrap();
//! let segmentation = segment_by_speed(&built, &SegmentConfig::default());
//! assert_eq!(segmentation.runs.len(), 1);
//! ```

use geo::LineString;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, to_line_string};
use crate::{
    BuiltTrajectory, GpsPoint, Result, TimeRange, Trajectory, TrajectoryError,
    METERS_PER_NAUTICAL_MILE, MS_PER_HOUR,
};

/// Smallest allowed bin count
pub const MIN_BIN_COUNT: u16 = 6;

/// Largest allowed bin count
pub const MAX_BIN_COUNT: u16 = 60;

/// Fixed emphasis for segments without a usable time delta
pub const UNKNOWN_EMPHASIS: f64 = 0.15;

/// Configuration for speed segmentation.
///
/// The defaults suit small-craft GPS tracks; they are a visualization
/// preference rather than an invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct SegmentConfig {
    /// Number of speed bins, clamped to [6, 60].
    /// Default: 24
    pub bin_count: u16,

    /// Upper end of the emphasized low-speed regime in knots.
    /// Default: 6.0
    pub low_speed_cutoff_knots: f64,

    /// Share of the normalized range given to the low-speed regime.
    /// Default: 0.55
    pub low_speed_share: f64,

    /// Percentile of observed speeds used as the ceiling.
    /// Default: 0.95
    pub ceiling_percentile: f64,

    /// Below this many timed segments the maximum speed is the ceiling.
    /// Default: 10
    pub min_segments_for_percentile: u32,

    /// Lowest allowed ceiling in knots.
    /// Default: 6.1
    pub min_ceiling_knots: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            bin_count: 24,
            low_speed_cutoff_knots: 6.0,
            low_speed_share: 0.55,
            ceiling_percentile: 0.95,
            min_segments_for_percentile: 10,
            min_ceiling_knots: 6.1,
        }
    }
}

impl SegmentConfig {
    /// Bin count clamped into the supported range.
    pub fn effective_bin_count(&self) -> u16 {
        self.bin_count.clamp(MIN_BIN_COUNT, MAX_BIN_COUNT)
    }

    /// Reject values the emphasis mapping cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.low_speed_cutoff_knots.is_finite() && self.low_speed_cutoff_knots > 0.0) {
            return Err(config_error("low_speed_cutoff_knots must be positive"));
        }
        if !(self.low_speed_share > 0.0 && self.low_speed_share < 1.0) {
            return Err(config_error("low_speed_share must be within (0, 1)"));
        }
        if !(self.ceiling_percentile > 0.0 && self.ceiling_percentile <= 1.0) {
            return Err(config_error("ceiling_percentile must be within (0, 1]"));
        }
        if !(self.min_ceiling_knots.is_finite()
            && self.min_ceiling_knots > self.low_speed_cutoff_knots)
        {
            return Err(config_error(
                "min_ceiling_knots must exceed low_speed_cutoff_knots",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> TrajectoryError {
    TrajectoryError::ConfigError {
        message: message.to_string(),
    }
}

/// Speed classification of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SpeedBin {
    /// Bin index in `0..bin_count`, higher is faster
    Bin { index: u16 },
    /// No valid time delta for the segment
    Unknown,
}

impl SpeedBin {
    /// Normalized 0..1 emphasis a renderer can map to color or weight.
    pub fn emphasis(&self, bin_count: u16) -> f64 {
        match *self {
            SpeedBin::Bin { index } => {
                let n = bin_count.clamp(MIN_BIN_COUNT, MAX_BIN_COUNT);
                index.min(n - 1) as f64 / (n - 1) as f64
            }
            SpeedBin::Unknown => UNKNOWN_EMPHASIS,
        }
    }
}

/// A maximal run of consecutive segments sharing a bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SpeedRun {
    /// Polyline vertices; consecutive runs share their boundary vertex
    pub positions: Vec<GpsPoint>,
    pub bin: SpeedBin,
    /// Number of per-sample segments merged into this run
    pub segment_count: u32,
}

impl SpeedRun {
    /// Run geometry as a `geo::LineString` for renderers working in `geo` types.
    pub fn line_string(&self) -> LineString<f64> {
        to_line_string(&self.positions)
    }
}

/// Result of segmenting a path by speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SpeedSegmentation {
    pub runs: Vec<SpeedRun>,
    /// Ceiling used for the upper part of the mapping (knots)
    pub ceiling_knots: f64,
    /// Effective bin count after clamping
    pub bin_count: u16,
    /// Total segments classified
    pub segment_count: u32,
    /// Segments without a valid time delta
    pub unknown_segments: u32,
}

/// Instantaneous speed between two samples in knots.
///
/// `None` unless both timestamps are known and the later is strictly after
/// the earlier.
pub fn segment_speed_knots(
    a: &GpsPoint,
    a_time: Option<i64>,
    b: &GpsPoint,
    b_time: Option<i64>,
) -> Option<f64> {
    let (t0, t1) = (a_time?, b_time?);
    if t1 <= t0 {
        return None;
    }
    let meters = haversine_distance(a, b);
    if !meters.is_finite() {
        return None;
    }
    let hours = t1.saturating_sub(t0) as f64 / MS_PER_HOUR;
    Some((meters / METERS_PER_NAUTICAL_MILE) / hours)
}

/// Ceiling for the upper part of the emphasis mapping.
///
/// The configured percentile of `speeds`, or the maximum when fewer than
/// `min_segments_for_percentile` speeds exist, floored at `min_ceiling_knots`.
pub fn adaptive_ceiling(speeds: &[f64], config: &SegmentConfig) -> f64 {
    let mut sorted: Vec<f64> = speeds.iter().copied().filter(|s| s.is_finite()).collect();
    if sorted.is_empty() {
        return config.min_ceiling_knots;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let raw = if sorted.len() < config.min_segments_for_percentile as usize {
        sorted[sorted.len() - 1]
    } else {
        let p = config.ceiling_percentile.clamp(0.0, 1.0);
        let rank = ((sorted.len() - 1) as f64 * p).floor() as usize;
        sorted[rank.min(sorted.len() - 1)]
    };
    raw.max(config.min_ceiling_knots)
}

/// Map a speed into [0, 1] with the low-speed regime stretched.
pub fn emphasis_normalize(speed_knots: f64, ceiling_knots: f64, config: &SegmentConfig) -> f64 {
    let cutoff = config.low_speed_cutoff_knots;
    let share = config.low_speed_share;
    let speed = speed_knots.max(0.0);

    if speed <= cutoff {
        return share * (speed / cutoff);
    }
    if ceiling_knots <= cutoff {
        return 1.0;
    }
    let upper = ((speed - cutoff) / (ceiling_knots - cutoff)).clamp(0.0, 1.0);
    share + (1.0 - share) * upper
}

/// Quantize a speed into a bin.
pub fn speed_bin(speed_knots: f64, ceiling_knots: f64, config: &SegmentConfig) -> SpeedBin {
    let n = config.effective_bin_count();
    let normalized = emphasis_normalize(speed_knots, ceiling_knots, config);
    let index = ((normalized * n as f64).floor() as u16).min(n - 1);
    SpeedBin::Bin { index }
}

/// Segment a trajectory's static path (original file order) by speed.
///
/// Untimed trajectories come back as a single unknown-speed run.
pub fn segment_by_speed(trajectory: &BuiltTrajectory, config: &SegmentConfig) -> SpeedSegmentation {
    let samples: Vec<(Option<i64>, GpsPoint)> = match trajectory {
        BuiltTrajectory::Timed(t) => t.file_order_samples().collect(),
        BuiltTrajectory::Untimed(u) => u.whole_path().map(|p| (None, p)).collect(),
    };
    let speeds = segment_speeds(&samples);
    let ceiling = adaptive_ceiling(&known(&speeds), config);
    let result = merge_runs(&samples, &speeds, ceiling, config);
    debug!(
        "[Segments] {} segments -> {} runs (ceiling {:.2} kn, {} unknown)",
        result.segment_count,
        result.runs.len(),
        result.ceiling_knots,
        result.unknown_segments
    );
    result
}

/// Segment only the timed samples inside `range`, in timestamp order.
///
/// The ceiling comes from the whole trajectory so colors stay stable while
/// the range changes.
pub fn segment_range_by_speed(
    trajectory: &Trajectory,
    range: TimeRange,
    config: &SegmentConfig,
) -> SpeedSegmentation {
    let all: Vec<(Option<i64>, GpsPoint)> = trajectory.file_order_samples().collect();
    let ceiling = adaptive_ceiling(&known(&segment_speeds(&all)), config);

    let range = range.clamp_to(&trajectory.time_bounds());
    let samples: Vec<(Option<i64>, GpsPoint)> = trajectory
        .timed_samples()
        .filter(|(t, _)| range.contains(*t))
        .map(|(t, p)| (Some(t), p))
        .collect();
    let speeds = segment_speeds(&samples);
    merge_runs(&samples, &speeds, ceiling, config)
}

fn segment_speeds(samples: &[(Option<i64>, GpsPoint)]) -> Vec<Option<f64>> {
    samples
        .windows(2)
        .map(|w| segment_speed_knots(&w[0].1, w[0].0, &w[1].1, w[1].0))
        .collect()
}

fn known(speeds: &[Option<f64>]) -> Vec<f64> {
    speeds.iter().flatten().copied().collect()
}

/// Run-length encode the per-segment bins into polyline runs.
fn merge_runs(
    samples: &[(Option<i64>, GpsPoint)],
    speeds: &[Option<f64>],
    ceiling: f64,
    config: &SegmentConfig,
) -> SpeedSegmentation {
    let mut runs: Vec<SpeedRun> = Vec::new();
    let mut unknown_segments = 0;

    for (i, speed) in speeds.iter().enumerate() {
        let bin = match speed {
            Some(s) => speed_bin(*s, ceiling, config),
            None => {
                unknown_segments += 1;
                SpeedBin::Unknown
            }
        };
        let (from, to) = (samples[i].1, samples[i + 1].1);

        match runs.last_mut() {
            Some(run) if run.bin == bin => {
                run.positions.push(to);
                run.segment_count += 1;
            }
            _ => runs.push(SpeedRun {
                positions: vec![from, to],
                bin,
                segment_count: 1,
            }),
        }
    }

    SpeedSegmentation {
        runs,
        ceiling_knots: ceiling,
        bin_count: config.effective_bin_count(),
        segment_count: speeds.len() as u32,
        unknown_segments,
    }
}
