//! # Playback Clock
//!
//! Tick-driven state machine that moves a "current time" cursor through a
//! bounded range of a [`Trajectory`].
//!
//! ## Run states
//!
//! - `Stopped` - nothing advances; ticks are no-ops
//! - `Playing` - the cursor advances by `rate * wall_delta`
//! - `TailDecaying` - the cursor is parked at the range end while a virtual
//!   time keeps advancing, so a trailing visualization can shrink to empty
//!
//! The clock owns no timers or threads. The host calls [`PlaybackClock::tick`]
//! from its animation loop with a wall-clock timestamp; each tick does a
//! bounded amount of work and returns. Observers are notified synchronously
//! on emitting ticks, seeks and range changes.
//!
//! ## Rate
//!
//! The rate is simulated milliseconds per wall-clock second. A rate of
//! 240 000 plays four simulated minutes per second (the "240x" preset).
//! `AutoFitSeconds(n)` derives the rate so the whole range plays in `n`
//! seconds and is recomputed whenever the range changes.

use std::borrow::Cow;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::stats::{live_stats, LiveStats, DEFAULT_ROLLING_HALF_WINDOW_MS};
use crate::{GpsPoint, RangePath, Result, TimeRange, Trajectory, TrajectoryError};

/// Run state of the playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RunState {
    Stopped,
    Playing,
    TailDecaying,
}

/// How the playback rate is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RateMode {
    /// Explicit rate in simulated ms per wall-clock second
    Fixed { rate: f64 },
    /// Rate fitted so the whole range plays in `seconds`
    AutoFitSeconds { seconds: f64 },
}

/// Configuration for the playback clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct PlaybackConfig {
    /// Largest wall-clock delta applied by a single tick (ms).
    /// Default: 100.0 (avoids jumps after the host stalls)
    pub max_tick_delta_ms: f64,

    /// Length of the trailing "recent path" window (ms).
    /// Default: 300000 (5 minutes)
    pub trail_window_ms: i64,

    /// Rate used until one is chosen (simulated ms per second).
    /// Default: 240000.0
    pub default_rate: f64,

    /// Selectable rates for [`PlaybackClock::set_rate_preset`].
    /// Default: 60000, 120000, 240000, 480000
    pub rate_presets: Vec<f64>,

    /// Step used by [`PlaybackClock::scrub_step`] (ms).
    /// Default: 10000
    pub scrub_step_ms: i64,

    /// Half-window for the rolling speed in emitted stats (ms).
    /// Default: 30000
    pub rolling_half_window_ms: i64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_tick_delta_ms: 100.0,
            trail_window_ms: 5 * 60 * 1000,
            default_rate: 240_000.0,
            rate_presets: vec![60_000.0, 120_000.0, 240_000.0, 480_000.0],
            scrub_step_ms: 10_000,
            rolling_half_window_ms: DEFAULT_ROLLING_HALF_WINDOW_MS,
        }
    }
}

impl PlaybackConfig {
    /// Reject values the clock cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_tick_delta_ms.is_finite() && self.max_tick_delta_ms > 0.0) {
            return Err(config_error("max_tick_delta_ms must be positive"));
        }
        if self.trail_window_ms < 0 {
            return Err(config_error("trail_window_ms must not be negative"));
        }
        if !is_valid_rate(self.default_rate) {
            return Err(config_error("default_rate must be positive"));
        }
        if self.rate_presets.iter().any(|&r| !is_valid_rate(r)) {
            return Err(config_error("rate_presets must all be positive"));
        }
        if self.scrub_step_ms <= 0 {
            return Err(config_error("scrub_step_ms must be positive"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> TrajectoryError {
    TrajectoryError::ConfigError {
        message: message.to_string(),
    }
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Receives notifications from a [`PlaybackClock`].
///
/// Calls happen synchronously inside the clock operation that caused them.
pub trait PlaybackObserver: Send {
    fn on_time_changed(&mut self, time_ms: i64);

    fn on_stats_changed(&mut self, stats: &LiveStats);
}

/// Snapshot returned by every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TickOutput {
    pub current_time: i64,
    pub run_state: RunState,
    /// Virtual time past the range end while tail-decaying
    pub tail_time: Option<i64>,
}

/// Playback state machine over one trajectory.
///
/// Usually borrows the trajectory; [`PlaybackClock::owned`] builds a
/// `'static` clock for hosts that cannot hold a borrow.
pub struct PlaybackClock<'a> {
    trajectory: Cow<'a, Trajectory>,
    bounds: TimeRange,
    range: TimeRange,
    /// Fractional cursor so slow rates do not lose sub-millisecond advances
    cursor: f64,
    rate: f64,
    rate_mode: RateMode,
    run_state: RunState,
    tail_time: Option<f64>,
    /// Set once a tail phase ran to completion; hides the trail until the
    /// cursor is touched again
    trail_exhausted: bool,
    last_tick_ms: Option<f64>,
    config: PlaybackConfig,
    observers: Vec<Box<dyn PlaybackObserver + 'a>>,
}

impl<'a> PlaybackClock<'a> {
    /// Create a stopped clock with the cursor at the start of `initial_range`.
    ///
    /// The range is normalized and clamped to the trajectory bounds.
    pub fn new(trajectory: &'a Trajectory, initial_range: TimeRange, config: PlaybackConfig) -> Self {
        Self::with_trajectory(Cow::Borrowed(trajectory), initial_range, config)
    }

    fn with_trajectory(
        trajectory: Cow<'a, Trajectory>,
        initial_range: TimeRange,
        config: PlaybackConfig,
    ) -> Self {
        let bounds = trajectory.time_bounds();
        let range = initial_range.clamp_to(&bounds);
        let rate = if is_valid_rate(config.default_rate) {
            config.default_rate
        } else {
            PlaybackConfig::default().default_rate
        };
        Self {
            trajectory,
            bounds,
            range,
            cursor: range.start as f64,
            rate,
            rate_mode: RateMode::Fixed { rate },
            run_state: RunState::Stopped,
            tail_time: None,
            trail_exhausted: false,
            last_tick_ms: None,
            config,
            observers: Vec::new(),
        }
    }

    /// Clock over the trajectory's full time range with default configuration.
    pub fn for_trajectory(trajectory: &'a Trajectory) -> Self {
        Self::new(trajectory, trajectory.time_bounds(), PlaybackConfig::default())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn current_time(&self) -> i64 {
        self.cursor.round() as i64
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn rate_mode(&self) -> RateMode {
        self.rate_mode
    }

    /// Effective rate in simulated ms per wall-clock second.
    pub fn rate_multiplier(&self) -> f64 {
        self.rate
    }

    /// Rate as a plain speed-up factor (simulated time over wall time).
    pub fn speedup(&self) -> f64 {
        self.rate / 1000.0
    }

    pub fn tail_time(&self) -> Option<i64> {
        self.tail_time.map(|t| t.round() as i64)
    }

    pub fn is_playing(&self) -> bool {
        self.run_state != RunState::Stopped
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Interpolated position at the cursor.
    pub fn current_position(&self) -> GpsPoint {
        self.trajectory.position_at_time(self.current_time())
    }

    /// Stats over the selected range at the current cursor.
    pub fn live_stats(&self) -> LiveStats {
        live_stats(
            &self.trajectory,
            self.range,
            self.current_time(),
            self.config.rolling_half_window_ms,
        )
    }

    /// Register an observer for time and stats notifications.
    pub fn add_observer(&mut self, observer: Box<dyn PlaybackObserver + 'a>) {
        self.observers.push(observer);
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Begin or resume playback.
    ///
    /// From the range end (or past it) the clock goes straight into the tail
    /// phase without rewinding; otherwise it resumes from the cursor.
    pub fn start(&mut self) {
        if self.run_state != RunState::Stopped {
            return;
        }
        self.last_tick_ms = None;
        self.trail_exhausted = false;

        let end = self.range.end as f64;
        if self.cursor >= end {
            self.cursor = end;
            self.tail_time = Some(end);
            self.run_state = RunState::TailDecaying;
            debug!("[Playback] Start at range end, entering tail phase");
        } else {
            self.tail_time = None;
            self.run_state = RunState::Playing;
            debug!("[Playback] Start at {}", self.current_time());
        }
    }

    /// Stop playback and cancel any tail phase.
    pub fn stop(&mut self) {
        if self.run_state != RunState::Stopped {
            debug!("[Playback] Stop at {}", self.current_time());
        }
        self.run_state = RunState::Stopped;
        self.tail_time = None;
        self.last_tick_ms = None;
    }

    pub fn toggle(&mut self) {
        if self.run_state == RunState::Stopped {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Advance the clock to wall-clock time `now_ms`.
    ///
    /// The first tick after a start only records the wall-clock baseline.
    /// Deltas are clamped to `[0, max_tick_delta_ms]`.
    pub fn tick(&mut self, now_ms: f64) -> TickOutput {
        if self.run_state == RunState::Stopped || !now_ms.is_finite() {
            return self.output();
        }

        let dt = match self.last_tick_ms {
            Some(last) => (now_ms - last).clamp(0.0, self.config.max_tick_delta_ms),
            None => 0.0,
        };
        self.last_tick_ms = Some(now_ms);
        let advance = self.rate * dt / 1000.0;

        match self.run_state {
            RunState::Playing => {
                let end = self.range.end as f64;
                let next = self.cursor + advance;
                if next >= end {
                    self.cursor = end;
                    self.emit();
                    self.run_state = RunState::TailDecaying;
                    self.tail_time = Some(next);
                    debug!("[Playback] Reached range end, entering tail phase");
                    self.finish_tail_if_done();
                } else {
                    self.cursor = next;
                    self.emit();
                }
            }
            RunState::TailDecaying => {
                let tail = self.tail_time.unwrap_or(self.range.end as f64) + advance;
                self.tail_time = Some(tail);
                self.finish_tail_if_done();
            }
            RunState::Stopped => {}
        }

        self.output()
    }

    fn finish_tail_if_done(&mut self) {
        let limit = self.range.end as f64 + self.config.trail_window_ms as f64;
        if self.tail_time.is_some_and(|t| t > limit) {
            debug!("[Playback] Tail phase complete");
            self.stop();
            self.trail_exhausted = true;
        }
    }

    fn output(&self) -> TickOutput {
        TickOutput {
            current_time: self.current_time(),
            run_state: self.run_state,
            tail_time: self.tail_time(),
        }
    }

    // ========================================================================
    // Cursor control
    // ========================================================================

    /// Manual seek: stops playback and moves the cursor to `t` clamped into
    /// the range.
    pub fn seek(&mut self, t: i64) {
        self.stop();
        self.move_cursor(t);
    }

    /// Move the cursor without touching the run state.
    ///
    /// Cancels a tail phase: a tail-decaying clock resumes playing from the
    /// new position.
    pub fn set_current_time(&mut self, t: i64) {
        if self.run_state == RunState::TailDecaying {
            self.run_state = RunState::Playing;
        }
        self.tail_time = None;
        self.move_cursor(t);
    }

    /// Manual step of `steps` scrub steps; snaps to the nearest sample when
    /// one lies within the step.
    pub fn scrub_step(&mut self, steps: i32) {
        self.stop();
        if steps == 0 {
            return;
        }
        let current = self.current_time();
        let reach = self.config.scrub_step_ms.max(1).saturating_mul(steps as i64);
        let target = current.saturating_add(reach);
        let snapped = self.trajectory.snap_time(target);

        let delta = snapped.saturating_sub(current);
        let moves_forward = delta.signum() == reach.signum();
        let t = if moves_forward && delta.unsigned_abs() <= reach.unsigned_abs() {
            snapped
        } else {
            target
        };
        self.move_cursor(t);
    }

    /// Stop and rewind to the range start.
    pub fn reset_to_start(&mut self) {
        self.stop();
        self.move_cursor(self.range.start);
    }

    fn move_cursor(&mut self, t: i64) {
        self.trail_exhausted = false;
        self.cursor = self.range.clamp_time(t) as f64;
        self.emit();
    }

    // ========================================================================
    // Rate control
    // ========================================================================

    /// Fixed rate in simulated ms per wall-clock second. Invalid values are ignored.
    pub fn set_rate(&mut self, rate: f64) {
        if !is_valid_rate(rate) {
            warn!("[Playback] Ignoring invalid rate {}", rate);
            return;
        }
        self.rate = rate;
        self.rate_mode = RateMode::Fixed { rate };
    }

    /// Fixed rate snapped to the nearest configured preset.
    pub fn set_rate_preset(&mut self, rate: f64) {
        let snapped = nearest_preset(&self.config.rate_presets, rate).unwrap_or(rate);
        self.set_rate(snapped);
    }

    /// Fit the rate so the current range plays in `seconds`.
    pub fn set_auto_fit_seconds(&mut self, seconds: f64) {
        if !is_valid_rate(seconds) {
            warn!("[Playback] Ignoring invalid auto-fit duration {}", seconds);
            return;
        }
        self.rate_mode = RateMode::AutoFitSeconds { seconds };
        self.refit_rate();
    }

    fn refit_rate(&mut self) {
        if let RateMode::AutoFitSeconds { seconds } = self.rate_mode {
            let fitted = self.range.duration_ms() as f64 / seconds;
            // A zero-length range still needs a rate to run its tail phase
            self.rate = if is_valid_rate(fitted) {
                fitted
            } else {
                self.config.default_rate
            };
            debug!("[Playback] Auto-fit rate {:.1} for {}s", self.rate, seconds);
        }
    }

    /// Trail window length in whole minutes, clamped to 1..=10.
    pub fn set_trail_window_minutes(&mut self, minutes: u32) {
        self.config.trail_window_ms = minutes.clamp(1, 10) as i64 * 60 * 1000;
    }

    // ========================================================================
    // Range control
    // ========================================================================

    /// Replace the playback range.
    ///
    /// The range is clamped to the trajectory, the cursor is clamped into it
    /// and an auto-fit rate is recomputed. A tail phase is cancelled.
    pub fn set_range(&mut self, range: TimeRange) {
        self.range = range.clamp_to(&self.bounds);
        if self.run_state == RunState::TailDecaying {
            self.stop();
        }
        self.refit_rate();

        let before = self.current_time();
        self.cursor = self.cursor.clamp(self.range.start as f64, self.range.end as f64);
        if self.current_time() != before {
            self.emit_time();
        }
        self.emit_stats();
    }

    /// Move the range start handle: stops playback, snaps to the nearest
    /// sample and never passes the range end.
    pub fn set_range_start(&mut self, t: i64) {
        self.stop();
        let start = self.trajectory.snap_time(t).min(self.range.end);
        self.set_range(TimeRange::new(start, self.range.end));
    }

    /// Move the range end handle: stops playback, snaps to the nearest
    /// sample and never passes the range start.
    pub fn set_range_end(&mut self, t: i64) {
        self.stop();
        let end = self.trajectory.snap_time(t).max(self.range.start);
        self.set_range(TimeRange::new(self.range.start, end));
    }

    // ========================================================================
    // Trail
    // ========================================================================

    /// Time window of the trailing "recent path" overlay, `None` when empty.
    ///
    /// While tail-decaying the window start follows the virtual time, so the
    /// overlay shrinks until it vanishes at `range.end + trail_window_ms`.
    pub fn trail_window(&self) -> Option<TimeRange> {
        if self.trail_exhausted {
            return None;
        }
        let window = self.config.trail_window_ms;
        match (self.run_state, self.tail_time) {
            (RunState::TailDecaying, Some(tail)) => {
                let start = (tail.round() as i64)
                    .saturating_sub(window)
                    .max(self.range.start);
                (start < self.range.end).then(|| TimeRange::new(start, self.range.end))
            }
            _ => Some(self.recent_trail().range()),
        }
    }

    /// Positions of the trailing overlay.
    pub fn trail_path(&self) -> Vec<GpsPoint> {
        match self.run_state {
            RunState::TailDecaying => self
                .trail_window()
                .map(|w| self.trajectory.extract_range(w).collect())
                .unwrap_or_default(),
            _ if self.trail_exhausted => Vec::new(),
            _ => self.recent_trail().collect(),
        }
    }

    fn recent_trail(&self) -> RangePath<'_> {
        self.trajectory.recent_trail(
            self.current_time(),
            self.config.trail_window_ms,
            self.range.start,
        )
    }

    // ========================================================================
    // Notification
    // ========================================================================

    fn emit(&mut self) {
        self.emit_time();
        self.emit_stats();
    }

    fn emit_time(&mut self) {
        let t = self.current_time();
        for observer in self.observers.iter_mut() {
            observer.on_time_changed(t);
        }
    }

    fn emit_stats(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let stats = self.live_stats();
        for observer in self.observers.iter_mut() {
            observer.on_stats_changed(&stats);
        }
    }
}

impl PlaybackClock<'static> {
    /// Clock that owns its trajectory.
    pub fn owned(trajectory: Trajectory, initial_range: TimeRange, config: PlaybackConfig) -> Self {
        Self::with_trajectory(Cow::Owned(trajectory), initial_range, config)
    }
}

/// Nearest value in `presets`, `None` when there are none.
pub fn nearest_preset(presets: &[f64], rate: f64) -> Option<f64> {
    presets
        .iter()
        .copied()
        .min_by(|a, b| (a - rate).abs().total_cmp(&(b - rate).abs()))
}

/// Clock over `initial_range` with default configuration.
pub fn create_clock(trajectory: &Trajectory, initial_range: TimeRange) -> PlaybackClock<'_> {
    PlaybackClock::new(trajectory, initial_range, PlaybackConfig::default())
}
