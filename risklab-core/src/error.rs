//! Numeric error taxonomy shared by every scoring and risk computation.
//!
//! None of these are fatal to a decision. Callers map them to "this input is
//! excluded" or "this metric is undefined" and keep going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a computation could not produce a defined value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ComputeError {
    /// Fewer observations than the computation's minimum window.
    #[error("insufficient data: need {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A window or period below the computation's minimum was requested.
    #[error("invalid window: {window} (must be >= {minimum})")]
    InvalidWindow { window: usize, minimum: usize },

    /// A ratio whose denominator is zero (flat series, zero variance).
    #[error("undefined metric {metric}: {reason}")]
    UndefinedMetric {
        metric: String,
        reason: String,
    },
}

impl ComputeError {
    pub fn insufficient(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    pub fn undefined(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UndefinedMetric {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that mean "not enough history yet".
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

/// Validation failures when assembling a `PriceSeries`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("bars for {symbol} are not strictly increasing at index {index} ({date})")]
    NotIncreasing {
        symbol: String,
        index: usize,
        date: chrono::NaiveDate,
    },

    #[error("duplicate bar for {symbol} on {date}")]
    DuplicateTimestamp {
        symbol: String,
        date: chrono::NaiveDate,
    },
}
