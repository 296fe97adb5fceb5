//! SignalScore — one normalized directional opinion.

use serde::{Deserialize, Serialize};

/// A directional score in [-1, 1] with a weight in [0, 1].
///
/// Positive values are bullish, negative bearish; magnitude is strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub name: String,
    pub value: f64,
    pub weight: f64,
}

impl SignalScore {
    /// Builds a score, clamping `value` into [-1, 1] and `weight` into [0, 1].
    /// A NaN value collapses to neutral.
    pub fn new(name: impl Into<String>, value: f64, weight: f64) -> Self {
        let value = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
        let weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
        Self {
            name: name.into(),
            value,
            weight,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.value > 0.0
    }
}

/// Excluded-weight weighted average.
///
/// Only the supplied scores contribute; their weights are renormalized among
/// themselves. Returns `None` when nothing carries weight, never a silent 0.0.
pub fn weighted_average(scores: &[SignalScore]) -> Option<f64> {
    let total: f64 = scores.iter().map(|s| s.weight).sum();
    if total <= 0.0 {
        return None;
    }
    Some(scores.iter().map(|s| s.value * s.weight).sum::<f64>() / total)
}
