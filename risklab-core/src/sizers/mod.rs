//! Position Sizers — turn a symbol's return history into an allocation
//! fraction of portfolio value.
//!
//! Sizers never return a negative fraction. A negative edge is reported in the
//! recommendation's `outcome`; the decision layer turns it into an action.

pub mod fixed;
pub mod kelly;

pub use fixed::FixedFractionSizer;
pub use kelly::{kelly_fraction, KellyOutcome, KellySizer, WinLossStats};

use serde::{Deserialize, Serialize};

use crate::params::{require_positive, ParamError};

/// Recommended allocation, as a fraction of portfolio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizeRecommendation {
    /// In `[0, max_position_size_percent]`.
    pub fraction: f64,
    /// Unclipped Kelly fraction, when one was defined.
    pub raw_kelly: Option<f64>,
    pub outcome: KellyOutcome,
}

impl PositionSizeRecommendation {
    pub fn has_negative_edge(&self) -> bool {
        self.outcome == KellyOutcome::NegativeEdge
    }

    /// Same recommendation with the fraction multiplied by `factor` (clamped
    /// to `[0, 1]`).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            fraction: self.fraction * factor.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

/// Position sizing logic.
///
/// # Responsibilities
/// - Convert a return history → allocation fraction
/// - Respect the configured maximum allocation
///
/// # Non-Responsibilities
/// - Sizers do NOT decide BUY/SELL/HOLD (that's the decision engine's job)
/// - Sizers do NOT apply confidence scaling
pub trait Sizer: Send + Sync {
    fn recommend(&self, returns: &[f64]) -> PositionSizeRecommendation;

    /// Sizer name for records and logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    #[default]
    Kelly,
    FixedFraction,
}

/// `[sizing]` table. The default and maximum fractions are top-level engine
/// settings and are passed to [`SizingParams::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParams {
    pub method: SizingMethod,
    /// Non-zero returns required before Kelly is defined.
    pub min_trades: usize,
    /// Fractional Kelly multiplier (1.0 = full Kelly).
    pub kelly_multiplier: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            method: SizingMethod::Kelly,
            min_trades: 20,
            kelly_multiplier: 1.0,
        }
    }
}

impl SizingParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.min_trades < 2 {
            return Err(ParamError::new("sizing.min_trades", "must be >= 2"));
        }
        require_positive("sizing.kelly_multiplier", self.kelly_multiplier)?;
        if self.kelly_multiplier > 1.0 {
            return Err(ParamError::new("sizing.kelly_multiplier", "must be <= 1.0"));
        }
        Ok(())
    }

    /// Build the configured sizer.
    pub fn build(&self, default_fraction: f64, max_fraction: f64) -> Box<dyn Sizer> {
        match self.method {
            SizingMethod::Kelly => Box::new(
                KellySizer::new(default_fraction, max_fraction)
                    .with_min_trades(self.min_trades)
                    .with_multiplier(self.kelly_multiplier),
            ),
            SizingMethod::FixedFraction => {
                Box::new(FixedFractionSizer::new(default_fraction.min(max_fraction)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_selects_method() {
        let kelly = SizingParams::default().build(0.05, 0.20);
        assert_eq!(kelly.name(), "kelly");
        let fixed = SizingParams {
            method: SizingMethod::FixedFraction,
            ..SizingParams::default()
        }
        .build(0.05, 0.20);
        assert_eq!(fixed.name(), "fixed_fraction");
        assert_eq!(fixed.recommend(&[]).fraction, 0.05);
    }

    #[test]
    fn scaled_never_grows() {
        let rec = PositionSizeRecommendation {
            fraction: 0.2,
            raw_kelly: Some(0.4),
            outcome: KellyOutcome::Capped,
        };
        assert!((rec.scaled(0.5).fraction - 0.1).abs() < 1e-12);
        assert_eq!(rec.scaled(3.0).fraction, 0.2);
        assert_eq!(rec.scaled(-1.0).fraction, 0.0);
    }

    #[test]
    fn validate_rejects_leveraged_kelly() {
        let params = SizingParams {
            kelly_multiplier: 2.0,
            ..SizingParams::default()
        };
        assert!(params.validate().is_err());
    }
}
