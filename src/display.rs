//! Display formatting and slider tick generation.
//!
//! Every formatter renders undefined or degenerate values as [`PLACEHOLDER`]
//! so info panels never show `NaN` or negative durations.

use chrono::{DateTime, FixedOffset};

use crate::{GpsPoint, TimeRange};

/// Rendered in place of any value that cannot be displayed.
pub const PLACEHOLDER: &str = "-";

/// UTC offset of Japan Standard Time in minutes.
pub const JST_OFFSET_MINUTES: i32 = 9 * 60;

/// Default number of slider ticks.
pub const DEFAULT_TICK_COUNT: usize = 6;

const MS_PER_MINUTE: i64 = 60_000;

/// "12.34 km".
pub fn format_distance_km(meters: f64) -> String {
    if !meters.is_finite() || meters < 0.0 {
        return PLACEHOLDER.to_string();
    }
    format!("{:.2} km", meters / 1000.0)
}

/// "HH:MM:SS" with hours allowed to exceed 24.
pub fn format_duration_hms(duration_ms: Option<i64>) -> String {
    match duration_ms {
        Some(ms) if ms >= 0 => {
            let s = ms / 1000;
            format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// Knots with two decimals.
pub fn format_speed_knots(knots: Option<f64>) -> String {
    match knots {
        Some(k) if k.is_finite() && k > 0.0 => format!("{:.2}", k),
        _ => PLACEHOLDER.to_string(),
    }
}

/// "lat, lng" with six decimals each.
pub fn format_lat_lng(point: Option<GpsPoint>) -> String {
    match point {
        Some(p) if p.is_valid() => format!("{:.6}, {:.6}", p.latitude, p.longitude),
        _ => PLACEHOLDER.to_string(),
    }
}

fn local_time(ms: i64, utc_offset_minutes: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    Some(DateTime::from_timestamp_millis(ms)?.with_timezone(&offset))
}

fn format_local(ms: i64, utc_offset_minutes: i32, pattern: &str) -> String {
    local_time(ms, utc_offset_minutes)
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Wall-clock "HH:MM:SS" at a fixed UTC offset.
pub fn format_clock_time(ms: i64, utc_offset_minutes: i32) -> String {
    format_local(ms, utc_offset_minutes, "%H:%M:%S")
}

/// Slider tick label "HH:MM" at a fixed UTC offset.
pub fn format_tick_label(ms: i64, utc_offset_minutes: i32) -> String {
    format_local(ms, utc_offset_minutes, "%H:%M")
}

/// Calendar date "YYYY/MM/DD" at a fixed UTC offset.
pub fn format_date(ms: i64, utc_offset_minutes: i32) -> String {
    format_local(ms, utc_offset_minutes, "%Y/%m/%d")
}

/// "start 〜 end" label for a selected range.
pub fn format_range(range: TimeRange, utc_offset_minutes: i32) -> String {
    format!(
        "{} 〜 {}",
        format_clock_time(range.start, utc_offset_minutes),
        format_clock_time(range.end, utc_offset_minutes)
    )
}

fn round_to_minute(ms: f64) -> i64 {
    (ms / MS_PER_MINUTE as f64).round() as i64 * MS_PER_MINUTE
}

/// Evenly spaced slider tick times over `[start, end]`, rounded to the minute.
///
/// `count` is clamped to `2..=12`. Ticks that collapse onto the same minute
/// are merged; when fewer than two distinct ticks remain, or the span is
/// empty, the raw `[start, end]` pair is returned.
pub fn uniform_tick_times(start: i64, end: i64, count: usize) -> Vec<i64> {
    let count = count.clamp(2, 12);
    let span = end.saturating_sub(start);
    if span <= 0 {
        return vec![start, end];
    }

    let mut ticks: Vec<i64> = (0..count)
        .map(|i| round_to_minute(start as f64 + span as f64 * i as f64 / (count - 1) as f64))
        .collect();
    ticks.dedup();

    if ticks.len() < 2 {
        return vec![start, end];
    }
    ticks
}
