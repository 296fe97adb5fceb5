//! Confidence model.
//!
//! `confidence = completeness × (floor + (1 − floor) × strength)`
//!
//! - completeness: engine-weight-averaged coverage of the technical,
//!   fundamental and risk inputs, each in [0, 1]
//! - strength: `min(|composite| / saturation, 1)`
//!
//! Any excluded indicator, missing ratio or undefined risk metric lowers
//! completeness, so confidence with partial inputs is strictly below what the
//! same composite would earn with full inputs.

use serde::{Deserialize, Serialize};

use risklab_core::ParamError;

use crate::decision::scorer::EngineWeights;
use crate::risk::RiskSnapshot;

/// `[confidence]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceParams {
    /// Confidence of a complete but directionless input set.
    pub floor: f64,
    /// |composite| at which strength saturates.
    pub saturation: f64,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            floor: 0.5,
            saturation: 0.4,
        }
    }
}

impl ConfidenceParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(0.0..=1.0).contains(&self.floor) {
            return Err(ParamError::new("confidence.floor", "must be in [0, 1]"));
        }
        if !(self.saturation.is_finite() && self.saturation > 0.0 && self.saturation <= 1.0) {
            return Err(ParamError::new("confidence.saturation", "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Per-input coverage, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub technical: f64,
    pub fundamental: f64,
    pub risk: f64,
}

impl Coverage {
    pub fn completeness(&self, weights: &EngineWeights) -> f64 {
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted = weights.technical * self.technical
            + weights.fundamental * self.fundamental
            + weights.risk * self.risk;
        (weighted / total).clamp(0.0, 1.0)
    }
}

/// Risk coverage: 1.0 when both VaR₉₅ and drawdown are defined, 0.5 for one.
pub fn risk_coverage(snapshot: Option<&RiskSnapshot>) -> f64 {
    let Some(s) = snapshot else {
        return 0.0;
    };
    let defined = [s.var_95.is_some(), s.drawdown.is_some()]
        .iter()
        .filter(|d| **d)
        .count();
    defined as f64 / 2.0
}

pub fn confidence(
    composite: f64,
    coverage: &Coverage,
    weights: &EngineWeights,
    params: &ConfidenceParams,
) -> f64 {
    let strength = (composite.abs() / params.saturation).min(1.0);
    let c = coverage.completeness(weights) * (params.floor + (1.0 - params.floor) * strength);
    c.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: EngineWeights = EngineWeights {
        technical: 0.5,
        fundamental: 0.3,
        risk: 0.2,
    };

    const FULL: Coverage = Coverage {
        technical: 1.0,
        fundamental: 1.0,
        risk: 1.0,
    };

    #[test]
    fn full_inputs_strong_signal_is_certain() {
        let c = confidence(0.5, &FULL, &W, &ConfidenceParams::default());
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn directionless_full_inputs_sit_at_floor() {
        let c = confidence(0.0, &FULL, &W, &ConfidenceParams::default());
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn partial_inputs_strictly_lower() {
        let partial = Coverage {
            technical: 0.5,
            ..FULL
        };
        let params = ConfidenceParams::default();
        for composite in [-0.9, -0.1, 0.0, 0.2, 0.7] {
            assert!(
                confidence(composite, &partial, &W, &params)
                    < confidence(composite, &FULL, &W, &params)
            );
        }
    }

    #[test]
    fn risk_coverage_counts_defined_metrics() {
        use crate::risk::{RiskInputs, RiskParams};
        use chrono::NaiveDate;

        assert_eq!(risk_coverage(None), 0.0);

        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let returns: Vec<(NaiveDate, f64)> = (0..40)
            .map(|i| (base + chrono::Duration::days(i), if i % 2 == 0 { 0.01 } else { -0.008 }))
            .collect();
        let full = RiskSnapshot::compute(&RiskInputs::new(&returns, 1.0), &RiskParams::default(), 0.0);
        assert!(full.var_95.is_some() && full.drawdown.is_some());
        assert_eq!(risk_coverage(Some(&full)), 1.0);

        let mut one = full.clone();
        one.var_95 = None;
        assert_eq!(risk_coverage(Some(&one)), 0.5);

        let mut other = full.clone();
        other.drawdown = None;
        assert_eq!(risk_coverage(Some(&other)), 0.5);

        let mut neither = full;
        neither.var_95 = None;
        neither.drawdown = None;
        assert_eq!(risk_coverage(Some(&neither)), 0.0);
    }

    #[test]
    fn validate_bounds() {
        let bad = ConfidenceParams {
            saturation: 0.0,
            ..ConfidenceParams::default()
        };
        assert!(bad.validate().is_err());
        assert!(ConfidenceParams::default().validate().is_ok());
    }
}
