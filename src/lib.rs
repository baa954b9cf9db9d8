//! # Trajectory Engine
//!
//! Temporal trajectory engine for GPS track viewers.
//!
//! This library turns a sparse, irregularly sampled sequence of timestamped
//! positions into a continuous, queryable trajectory:
//! - Position lookup at any instant (clamped linear interpolation)
//! - Nearest-sample snapping and range extraction
//! - Distance, duration and average speed over a time range
//! - Rolling-window speed estimation
//! - Speed-binned polyline runs for rendering
//! - A tick-driven playback clock with auto-fit rate and a tail-decay phase
//!
//! Loading and parsing track files, drawing and widgets all live outside the
//! engine; callers hand in [`Sample`]s and receive plain data back.
//!
//! ## Features
//!
//! - **`ffi`** - Enable UniFFI bindings for foreign hosts
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trajectory_engine::{build_trajectory, range_stats, BuiltTrajectory, Sample, TimeRange};
//!
//! let samples = vec![
//!     Sample::timed(35.0, 139.0, 0),
//!     Sample::timed(35.0, 139.1, 10_000),
//! ];
//!
//! let built = build_trajectory(samples).unwrap();
//! if let BuiltTrajectory::Timed(trajectory) = built {
//!     let stats = range_stats(&trajectory, TimeRange::new(0, 10_000));
//!     assert_eq!(stats.duration_ms, 10_000);
//!     assert!(stats.avg_speed_knots.is_some());
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrajectoryError};

// Geographic utilities (haversine distance, path length, geo conversions)
pub mod geo_utils;
pub use geo_utils::{distance_meters, haversine_distance};

// Sorted time axis over timed samples
pub mod time_index;
pub use time_index::{closest_index, TimeIndex};

// Immutable trajectory with interpolation and range extraction
pub mod trajectory;
pub use trajectory::{build_trajectory, BuiltTrajectory, RangePath, Trajectory, UntimedTrajectory};

// Range statistics and rolling speed
pub mod stats;
pub use stats::{
    avg_speed_knots, live_stats, range_stats, rolling_speed, LiveStats, RangeStats,
    DEFAULT_ROLLING_HALF_WINDOW_MS, MIN_ROLLING_WINDOW_MS,
};

// Speed classification and run-length merged polylines
pub mod segments;
pub use segments::{
    segment_by_speed, segment_range_by_speed, SegmentConfig, SpeedBin, SpeedRun,
    SpeedSegmentation,
};

// Tick-driven playback state machine
pub mod playback;
pub use playback::{
    create_clock, PlaybackClock, PlaybackConfig, PlaybackObserver, RateMode, RunState, TickOutput,
};

// Display formatting and slider ticks
pub mod display;

// Aggregated engine configuration
pub mod config;
pub use config::EngineConfig;

// FFI bindings for foreign hosts
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TrajectoryEngineRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Milliseconds in one hour.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Meters in one nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

/// A GPS coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use trajectory_engine::GpsPoint;
/// let point = GpsPoint::new(35.681236, 139.767125); // Tokyo
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite numbers.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Linear blend between two points, `ratio` in [0, 1].
    pub fn lerp(&self, other: &GpsPoint, ratio: f64) -> GpsPoint {
        GpsPoint::new(
            self.latitude + (other.latitude - self.latitude) * ratio,
            self.longitude + (other.longitude - self.longitude) * ratio,
        )
    }
}

/// One input record: a position and an optional timestamp.
///
/// Samples are supplied in original file order, which need not be time order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Sample {
    pub point: GpsPoint,
    /// Milliseconds since the Unix epoch, `None` when unknown
    pub time_ms: Option<i64>,
}

impl Sample {
    /// A sample with a known timestamp.
    pub fn timed(latitude: f64, longitude: f64, time_ms: i64) -> Self {
        Self {
            point: GpsPoint::new(latitude, longitude),
            time_ms: Some(time_ms),
        }
    }

    /// A sample without a timestamp.
    pub fn untimed(latitude: f64, longitude: f64) -> Self {
        Self {
            point: GpsPoint::new(latitude, longitude),
            time_ms: None,
        }
    }
}

/// A closed time interval in milliseconds, always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Create a range, swapping the ends if given in reverse.
    pub fn new(a: i64, b: i64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Length of the range, never negative.
    pub fn duration_ms(&self) -> i64 {
        self.end.saturating_sub(self.start).max(0)
    }

    /// Whether `t` lies inside the closed interval.
    pub fn contains(&self, t: i64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Clamp a single instant into the range.
    pub fn clamp_time(&self, t: i64) -> i64 {
        t.clamp(self.start, self.end)
    }

    /// Clamp both ends into `bounds` and re-normalize.
    pub fn clamp_to(&self, bounds: &TimeRange) -> TimeRange {
        TimeRange::new(bounds.clamp_time(self.start), bounds.clamp_time(self.end))
    }
}

/// Bounding box of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(35.0, 139.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_time_range_normalizes() {
        let r = TimeRange::new(500, 100);
        assert_eq!(r.start, 100);
        assert_eq!(r.end, 500);
        assert_eq!(r.duration_ms(), 400);
        assert!(r.contains(100) && r.contains(500) && !r.contains(501));
    }

    #[test]
    fn test_time_range_clamp_to() {
        let bounds = TimeRange::new(0, 1000);
        let r = TimeRange::new(-500, 2000).clamp_to(&bounds);
        assert_eq!(r, bounds);

        let outside = TimeRange::new(3000, 4000).clamp_to(&bounds);
        assert_eq!(outside, TimeRange::new(1000, 1000));
        assert_eq!(outside.duration_ms(), 0);
    }

    #[test]
    fn test_time_range_duration_saturates() {
        let r = TimeRange::new(i64::MIN, i64::MAX);
        assert_eq!(r.duration_ms(), i64::MAX);
        assert!(r.contains(0));
    }
}
