//! Error types for configuration and for running the control loop

use thiserror::Error;

use crate::config::Bounds;

/// A configuration value that would break a controller invariant.
///
/// Configuration is never clamped into range; it is rejected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A PID gain is negative or non-finite
    #[error("{controller}: gain `{gain}` = {value} must be finite and >= 0")]
    InvalidGain {
        controller: &'static str,
        gain: &'static str,
        value: f64,
    },

    /// A symmetric saturation limit is non-positive, above 1.0 or non-finite
    #[error("{controller}: limit `{limit}` = {value} must lie in (0, 1]")]
    InvalidLimit {
        controller: &'static str,
        limit: &'static str,
        value: f64,
    },

    /// A lower bound exceeds its upper bound, or either is non-finite
    #[error("{controller}: bounds `{name}` [{min}, {max}] are inverted or non-finite")]
    InvalidBounds {
        controller: &'static str,
        name: &'static str,
        min: f64,
        max: f64,
    },

    /// A scalar that must be strictly positive is not
    #[error("{controller}: `{name}` = {value} must be finite and > 0")]
    NonPositive {
        controller: &'static str,
        name: &'static str,
        value: f64,
    },

    /// A scalar that must be non-negative is not
    #[error("{controller}: `{name}` = {value} must be finite and >= 0")]
    Negative {
        controller: &'static str,
        name: &'static str,
        value: f64,
    },

    /// A value lies outside the range its invariant allows
    #[error("{controller}: `{name}` = {value} must lie within [{min}, {max}]")]
    OutOfRange {
        controller: &'static str,
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A scalar that only needs to be a real number is NaN or infinite
    #[error("{controller}: `{name}` = {value} must be finite")]
    NonFinite {
        controller: &'static str,
        name: &'static str,
        value: f64,
    },
}

/// Root error type for running the cycle driver and its collaborators
#[derive(Error, Debug)]
pub enum EcuError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The sensor source could not produce a sample
    #[error("sensor error: {0}")]
    Sensor(String),

    /// A data dispatcher failed to initialize or consume a row
    #[error("dispatcher error: {0}")]
    Dispatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Logging could not be set up
    #[error("logging error: {0}")]
    Logging(String),
}

pub type EcuResult<T> = Result<T, EcuError>;

/// Check that `value` is finite and strictly positive
pub(crate) fn require_positive(
    controller: &'static str,
    name: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            controller,
            name,
            value,
        })
    }
}

/// Check that `value` is finite and not negative
pub(crate) fn require_non_negative(
    controller: &'static str,
    name: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative {
            controller,
            name,
            value,
        })
    }
}

/// Check that `value` is a finite number
pub(crate) fn require_finite(
    controller: &'static str,
    name: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite {
            controller,
            name,
            value,
        })
    }
}

/// Check that `[min, max]` is a finite, non-inverted interval
pub(crate) fn require_bounds(
    controller: &'static str,
    name: &'static str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvalidBounds {
            controller,
            name,
            min,
            max,
        })
    }
}

/// Check that `value` is a finite number within `range`
pub(crate) fn require_within(
    controller: &'static str,
    name: &'static str,
    value: f64,
    range: Bounds,
) -> Result<(), ConfigError> {
    if value.is_finite() && range.min <= value && value <= range.max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            controller,
            name,
            value,
            min: range.min,
            max: range.max,
        })
    }
}
