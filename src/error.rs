use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FluidError {
    /// A setter refused a value; the previous value is still in effect.
    #[error("invalid {parameter}: {reason}")]
    InvalidConfig {
        parameter: &'static str,
        reason: String,
    },

    #[error("cannot grow particle storage to {requested} particles")]
    Capacity { requested: usize },

    #[error("parallel compute device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("compute dispatch failed: {0}")]
    Dispatch(String),
}

pub type FluidResult<T> = Result<T, FluidError>;

impl FluidError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            parameter,
            reason: reason.into(),
        }
    }
}

// shared by every setter: finite and strictly above zero
pub(crate) fn require_positive(parameter: &'static str, value: f32) -> FluidResult<f32> {
    if !value.is_finite() {
        return Err(FluidError::invalid(parameter, format!("{value} is not finite")));
    }
    if value <= 0.0 {
        return Err(FluidError::invalid(parameter, format!("{value} must be > 0")));
    }
    Ok(value)
}

pub(crate) fn require_non_negative(parameter: &'static str, value: f32) -> FluidResult<f32> {
    if !value.is_finite() {
        return Err(FluidError::invalid(parameter, format!("{value} is not finite")));
    }
    if value < 0.0 {
        return Err(FluidError::invalid(parameter, format!("{value} must be >= 0")));
    }
    Ok(value)
}
