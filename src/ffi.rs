//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the engine to
//! Kotlin and Swift. Foreign hosts pass owned sample arrays; functions that
//! need timestamps return `None` for untimed or empty input.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::display::uniform_tick_times;
use crate::{
    build_trajectory, init_logging, live_stats, range_stats, rolling_speed, segment_by_speed,
    BuiltTrajectory, EngineConfig, GpsPoint, LiveStats, PlaybackClock, PlaybackConfig,
    PlaybackObserver, RangeStats, RunState, Sample, SegmentConfig, SpeedSegmentation,
    TickOutput, TimeRange, Trajectory,
};

// ============================================================================
// Listener Interface (playback notifications to the host)
// ============================================================================

/// Callback interface for playback notifications.
/// Implement this in Kotlin/Swift; calls arrive on the thread driving `tick`.
#[uniffi::export(callback_interface)]
pub trait PlaybackListener: Send + Sync {
    fn on_time_changed(&self, time_ms: i64);

    fn on_stats_changed(&self, stats: LiveStats);
}

struct ListenerObserver(Box<dyn PlaybackListener>);

impl PlaybackObserver for ListenerObserver {
    fn on_time_changed(&mut self, time_ms: i64) {
        self.0.on_time_changed(time_ms);
    }

    fn on_stats_changed(&mut self, stats: &LiveStats) {
        self.0.on_stats_changed(*stats);
    }
}

// ============================================================================
// Trajectory Functions
// ============================================================================

fn build(samples: Vec<Sample>) -> Option<BuiltTrajectory> {
    init_logging();
    match build_trajectory(samples) {
        Ok(built) => Some(built),
        Err(e) => {
            warn!("[TrajectoryEngineRust] {}", e);
            None
        }
    }
}

fn build_timed(samples: Vec<Sample>) -> Option<Trajectory> {
    match build(samples)? {
        BuiltTrajectory::Timed(t) => Some(t),
        BuiltTrajectory::Untimed(_) => {
            warn!("[TrajectoryEngineRust] Trajectory has no timestamps");
            None
        }
    }
}

/// `[first, last]` timestamps of the samples.
#[uniffi::export]
pub fn ffi_time_bounds(samples: Vec<Sample>) -> Option<TimeRange> {
    build_timed(samples).map(|t| t.time_bounds())
}

/// Interpolated position at `time_ms`.
#[uniffi::export]
pub fn ffi_position_at_time(samples: Vec<Sample>, time_ms: i64) -> Option<GpsPoint> {
    build_timed(samples).map(|t| t.position_at_time(time_ms))
}

/// Path over `range`, or the whole path when `range` is `None`.
///
/// Untimed samples only support the whole path.
#[uniffi::export]
pub fn ffi_extract_range(samples: Vec<Sample>, range: Option<TimeRange>) -> Vec<GpsPoint> {
    build(samples)
        .and_then(|built| built.extract_range(range).ok())
        .unwrap_or_default()
}

/// Distance, duration and average speed over `range`.
#[uniffi::export]
pub fn ffi_range_stats(samples: Vec<Sample>, range: TimeRange) -> Option<RangeStats> {
    build_timed(samples).map(|t| range_stats(&t, range))
}

/// Rolling speed in knots around `center_ms`.
#[uniffi::export]
pub fn ffi_rolling_speed(samples: Vec<Sample>, center_ms: i64, half_window_ms: i64) -> Option<f64> {
    rolling_speed(&build_timed(samples)?, center_ms, half_window_ms)
}

/// Speed-binned polyline runs for rendering.
#[uniffi::export]
pub fn ffi_segment_by_speed(
    samples: Vec<Sample>,
    config: SegmentConfig,
) -> Option<SpeedSegmentation> {
    let built = build(samples)?;
    let result = segment_by_speed(&built, &config);
    info!(
        "[TrajectoryEngineRust] Segmented {} segments into {} runs (ceiling {:.1} kn)",
        result.segment_count,
        result.runs.len(),
        result.ceiling_knots
    );
    Some(result)
}

/// Slider tick times over `[start_ms, end_ms]`.
#[uniffi::export]
pub fn ffi_uniform_tick_times(start_ms: i64, end_ms: i64, count: u32) -> Vec<i64> {
    uniform_tick_times(start_ms, end_ms, count as usize)
}

// ============================================================================
// Configuration
// ============================================================================

#[uniffi::export]
pub fn default_engine_config() -> EngineConfig {
    EngineConfig::default()
}

/// Parse a JSON engine config, `None` if it is malformed or invalid.
#[uniffi::export]
pub fn parse_engine_config(json: String) -> Option<EngineConfig> {
    init_logging();
    EngineConfig::from_json(&json)
        .map_err(|e| warn!("[TrajectoryEngineRust] {}", e))
        .ok()
}

// ============================================================================
// Playback Session
// ============================================================================

/// A playback clock that owns its trajectory, shareable across the FFI.
///
/// Listeners are called while the session lock is held, so they must not
/// call back into the same session.
#[derive(uniffi::Object)]
pub struct PlaybackSession {
    clock: Mutex<PlaybackClock<'static>>,
}

/// Create a playback session over the full time range of `samples`.
#[uniffi::export]
pub fn create_playback_session(
    samples: Vec<Sample>,
    config: PlaybackConfig,
) -> Option<Arc<PlaybackSession>> {
    let trajectory = build_timed(samples)?;
    if let Err(e) = config.validate() {
        warn!("[TrajectoryEngineRust] {}", e);
        return None;
    }
    let bounds = trajectory.time_bounds();
    info!(
        "[TrajectoryEngineRust] Playback session over {}..{}",
        bounds.start, bounds.end
    );
    Some(Arc::new(PlaybackSession {
        clock: Mutex::new(PlaybackClock::owned(trajectory, bounds, config)),
    }))
}

impl PlaybackSession {
    fn clock(&self) -> MutexGuard<'_, PlaybackClock<'static>> {
        // A panicking listener leaves the clock in a consistent state
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[uniffi::export]
impl PlaybackSession {
    pub fn add_listener(&self, listener: Box<dyn PlaybackListener>) {
        self.clock().add_observer(Box::new(ListenerObserver(listener)));
    }

    pub fn start(&self) {
        self.clock().start();
    }

    pub fn stop(&self) {
        self.clock().stop();
    }

    pub fn toggle(&self) {
        self.clock().toggle();
    }

    pub fn tick(&self, now_ms: f64) -> TickOutput {
        self.clock().tick(now_ms)
    }

    pub fn seek(&self, time_ms: i64) {
        self.clock().seek(time_ms);
    }

    pub fn scrub_step(&self, steps: i32) {
        self.clock().scrub_step(steps);
    }

    pub fn reset_to_start(&self) {
        self.clock().reset_to_start();
    }

    pub fn set_rate(&self, rate: f64) {
        self.clock().set_rate(rate);
    }

    pub fn set_rate_preset(&self, rate: f64) {
        self.clock().set_rate_preset(rate);
    }

    pub fn set_auto_fit_seconds(&self, seconds: f64) {
        self.clock().set_auto_fit_seconds(seconds);
    }

    pub fn set_trail_window_minutes(&self, minutes: u32) {
        self.clock().set_trail_window_minutes(minutes);
    }

    pub fn set_range(&self, range: TimeRange) {
        self.clock().set_range(range);
    }

    pub fn set_range_start(&self, time_ms: i64) {
        self.clock().set_range_start(time_ms);
    }

    pub fn set_range_end(&self, time_ms: i64) {
        self.clock().set_range_end(time_ms);
    }

    pub fn current_time(&self) -> i64 {
        self.clock().current_time()
    }

    pub fn run_state(&self) -> RunState {
        self.clock().run_state()
    }

    pub fn range(&self) -> TimeRange {
        self.clock().range()
    }

    pub fn rate_multiplier(&self) -> f64 {
        self.clock().rate_multiplier()
    }

    pub fn live_stats(&self) -> LiveStats {
        let clock = self.clock();
        live_stats(
            clock.trajectory(),
            clock.range(),
            clock.current_time(),
            clock.config().rolling_half_window_ms,
        )
    }

    pub fn trail_window(&self) -> Option<TimeRange> {
        self.clock().trail_window()
    }

    pub fn trail_path(&self) -> Vec<GpsPoint> {
        self.clock().trail_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn samples() -> Vec<Sample> {
        vec![
            Sample::timed(35.0, 139.0, 0),
            Sample::timed(35.0, 139.1, 10_000),
        ]
    }

    #[test]
    fn test_untimed_returns_none() {
        let untimed = vec![Sample::untimed(35.0, 139.0), Sample::untimed(35.1, 139.1)];
        assert!(ffi_time_bounds(untimed.clone()).is_none());
        assert!(ffi_position_at_time(untimed.clone(), 0).is_none());
        assert_eq!(ffi_extract_range(untimed.clone(), None).len(), 2);
        assert!(ffi_extract_range(untimed.clone(), Some(TimeRange::new(0, 1))).is_empty());
        assert!(create_playback_session(untimed, PlaybackConfig::default()).is_none());
        assert!(ffi_range_stats(vec![], TimeRange::new(0, 1)).is_none());
    }

    #[test]
    fn test_stats_through_ffi() {
        let stats = ffi_range_stats(samples(), TimeRange::new(0, 10_000)).unwrap();
        assert_eq!(stats.duration_ms, 10_000);
        assert!(stats.avg_speed_knots.unwrap() > 1700.0);
        let seg = ffi_segment_by_speed(samples(), SegmentConfig::default()).unwrap();
        assert_eq!(seg.runs.len(), 1);
    }

    struct CountingListener(Arc<AtomicUsize>);

    impl PlaybackListener for CountingListener {
        fn on_time_changed(&self, _time_ms: i64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stats_changed(&self, _stats: LiveStats) {}
    }

    #[test]
    fn test_playback_session() {
        let session = create_playback_session(samples(), PlaybackConfig::default()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        session.add_listener(Box::new(CountingListener(count.clone())));

        session.set_auto_fit_seconds(1.0);
        session.start();
        session.tick(0.0);
        let out = session.tick(100.0);
        assert_eq!(out.current_time, 1_000);
        assert_eq!(session.run_state(), RunState::Playing);

        session.seek(5_000);
        assert_eq!(session.run_state(), RunState::Stopped);
        assert_eq!(session.live_stats().current_time, 5_000);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
