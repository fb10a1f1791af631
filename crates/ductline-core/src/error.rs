//! Error types.

use thiserror::Error;

/// Configuration errors.
///
/// Raised when an option struct is constructed, updated or loaded with values
/// the engine cannot honor. Runtime edge cases (adding a point while idle,
/// querying an unknown id) are not errors and never produce one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidThreshold { field: &'static str, value: f64 },
    #[error("magnetic threshold ({magnetic}) must not be smaller than snap threshold ({snap})")]
    MagneticBelowSnap { snap: f64, magnetic: f64 },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must be a finite, positive number (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("snap priority must be between 1 and 5 (got {0})")]
    InvalidPriority(u8),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Check that `value` is finite and `>= 0`.
pub(crate) fn check_threshold(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

/// Check that `value` is finite and `> 0`.
pub(crate) fn check_positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
