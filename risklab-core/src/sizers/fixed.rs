//! Fixed-fraction sizer: always allocate the same fraction.

use crate::sizers::{KellyOutcome, PositionSizeRecommendation, Sizer};

#[derive(Debug, Clone)]
pub struct FixedFractionSizer {
    fraction: f64,
}

impl FixedFractionSizer {
    /// `fraction` is clamped into `[0, 1]`.
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

impl Sizer for FixedFractionSizer {
    fn recommend(&self, _returns: &[f64]) -> PositionSizeRecommendation {
        PositionSizeRecommendation {
            fraction: self.fraction,
            raw_kelly: None,
            outcome: KellyOutcome::Fixed,
        }
    }

    fn name(&self) -> &str {
        "fixed_fraction"
    }
}
