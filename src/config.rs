//! Aggregated engine configuration.
//!
//! Hosts usually ship one JSON blob; every field is optional and falls back
//! to its default.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::display::{DEFAULT_TICK_COUNT, JST_OFFSET_MINUTES};
use crate::{OptionExt, PlaybackConfig, Result, SegmentConfig, TrajectoryError};

/// Configuration for all engine components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct EngineConfig {
    pub segments: SegmentConfig,
    pub playback: PlaybackConfig,

    /// UTC offset used for clock and date labels (minutes).
    /// Default: 540 (JST)
    pub utc_offset_minutes: i32,

    /// Number of slider ticks requested.
    /// Default: 6
    pub tick_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segments: SegmentConfig::default(),
            playback: PlaybackConfig::default(),
            utc_offset_minutes: JST_OFFSET_MINUTES,
            tick_count: DEFAULT_TICK_COUNT as u32,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| TrajectoryError::ConfigError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TrajectoryError::ConfigError {
            message: e.to_string(),
        })
    }

    /// Check every component config.
    pub fn validate(&self) -> Result<()> {
        self.segments.validate()?;
        self.playback.validate()?;
        self.utc_offset()?;
        Ok(())
    }

    /// Fixed offset for clock and date labels.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_config("utc_offset_minutes must be within one day")
    }
}
