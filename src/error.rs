//! Unified error handling for the trajectory engine.
//!
//! Only construction and configuration can fail. Query and playback
//! operations clamp out-of-range input instead of returning errors, and
//! numeric degeneracies come back as `None`.

use thiserror::Error;

/// Unified error type for trajectory engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    /// No sample survived coordinate validation
    #[error("No usable points found ({dropped} samples dropped)")]
    EmptyTrajectory { dropped: usize },

    /// A time-based operation was requested on a trajectory without timestamps
    #[error("'{operation}' requires timestamps, but the trajectory is untimed")]
    Untimed { operation: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Result type alias for trajectory engine operations.
pub type Result<T> = std::result::Result<T, TrajectoryError>;

/// Extension trait for converting Option to TrajectoryError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an untimed-trajectory error.
    fn ok_or_untimed(self, operation: &str) -> Result<T>;

    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_untimed(self, operation: &str) -> Result<T> {
        self.ok_or_else(|| TrajectoryError::Untimed {
            operation: operation.to_string(),
        })
    }

    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrajectoryError::ConfigError {
            message: message.to_string(),
        })
    }
}
