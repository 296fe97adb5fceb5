//! Shared parameter validation error.

use thiserror::Error;

/// A tunable parameter outside its allowed range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid parameter {field}: {reason}")]
pub struct ParamError {
    pub field: String,
    pub reason: String,
}

impl ParamError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn require_period(field: &str, value: usize) -> Result<(), ParamError> {
    if value == 0 {
        return Err(ParamError::new(field, "must be >= 1"));
    }
    Ok(())
}

pub(crate) fn require_positive(field: &str, value: f64) -> Result<(), ParamError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ParamError::new(field, format!("must be > 0, got {value}")));
    }
    Ok(())
}

pub(crate) fn require_weights(field: &str, weights: &[f64]) -> Result<(), ParamError> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ParamError::new(field, "weights must be finite and >= 0"));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(ParamError::new(field, "at least one weight must be positive"));
    }
    Ok(())
}
