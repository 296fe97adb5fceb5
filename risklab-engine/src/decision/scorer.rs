//! Composite scoring strategies.
//!
//! A closed set selected by the `scoring` config key. Every strategy maps
//! (technical, fundamental, risk penalty) to a composite in [-1, 1]. A missing
//! input contributes nothing; the confidence model is what accounts for it.

use serde::{Deserialize, Serialize};

use crate::risk::{RiskParams, RiskSnapshot};

/// Engine-level weights. Validated to sum to 1 at config load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub risk: f64,
}

impl EngineWeights {
    pub fn total(&self) -> f64 {
        self.technical + self.fundamental + self.risk
    }
}

/// The three scored inputs, each possibly unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub technical: Option<f64>,
    pub fundamental: Option<f64>,
    /// In [0, 1]; larger means more downside risk.
    pub risk_penalty: Option<f64>,
}

impl ScoreInputs {
    fn directional(&self, w: &EngineWeights) -> f64 {
        w.technical * self.technical.unwrap_or(0.0) + w.fundamental * self.fundamental.unwrap_or(0.0)
    }
}

pub trait CompositeScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Composite score in [-1, 1].
    fn score(&self, inputs: &ScoreInputs, weights: &EngineWeights) -> f64;
}

/// `w_t·T + w_f·F − w_r·penalty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveScorer;

impl CompositeScorer for AdditiveScorer {
    fn name(&self) -> &'static str {
        "additive"
    }

    fn score(&self, inputs: &ScoreInputs, weights: &EngineWeights) -> f64 {
        let penalty = weights.risk * inputs.risk_penalty.unwrap_or(0.0);
        (inputs.directional(weights) - penalty).clamp(-1.0, 1.0)
    }
}

/// `(w_t·T + w_f·F) × (1 − w_r·penalty)`: risk shrinks conviction toward zero
/// in both directions instead of pushing toward SELL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DampedScorer;

impl CompositeScorer for DampedScorer {
    fn name(&self) -> &'static str {
        "damped"
    }

    fn score(&self, inputs: &ScoreInputs, weights: &EngineWeights) -> f64 {
        let damping = 1.0 - weights.risk * inputs.risk_penalty.unwrap_or(0.0);
        (inputs.directional(weights) * damping.clamp(0.0, 1.0)).clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    #[default]
    Additive,
    Damped,
}

impl ScoringStrategy {
    pub fn scorer(&self) -> &'static dyn CompositeScorer {
        match self {
            Self::Additive => &AdditiveScorer,
            Self::Damped => &DampedScorer,
        }
    }
}

/// Risk penalty in [0, 1]: mean of the available components
/// `min(|VaR₉₅| / var_scale, 1)` and `min(|max DD| / dd_scale, 1)`.
///
/// Monotonic in both: a deeper VaR or drawdown never lowers the penalty.
/// `None` when neither component is defined.
pub fn risk_penalty(snapshot: &RiskSnapshot, params: &RiskParams) -> Option<f64> {
    let components: Vec<f64> = [
        snapshot
            .var_95
            .map(|v| (v.quantile.abs() / params.var_penalty_scale).min(1.0)),
        snapshot
            .max_drawdown()
            .map(|dd| (dd.abs() / params.drawdown_penalty_scale).min(1.0)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        None
    } else {
        Some(components.iter().sum::<f64>() / components.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: EngineWeights = EngineWeights {
        technical: 0.5,
        fundamental: 0.3,
        risk: 0.2,
    };

    #[test]
    fn additive_formula() {
        let inputs = ScoreInputs {
            technical: Some(0.8),
            fundamental: Some(-0.5),
            risk_penalty: Some(0.5),
        };
        let s = AdditiveScorer.score(&inputs, &W);
        assert!((s - (0.4 - 0.15 - 0.1)).abs() < 1e-12);
    }

    #[test]
    fn missing_inputs_contribute_nothing() {
        let inputs = ScoreInputs {
            technical: Some(1.0),
            ..ScoreInputs::default()
        };
        assert!((AdditiveScorer.score(&inputs, &W) - 0.5).abs() < 1e-12);
        assert_eq!(AdditiveScorer.score(&ScoreInputs::default(), &W), 0.0);
    }

    #[test]
    fn damped_preserves_sign() {
        let inputs = ScoreInputs {
            technical: Some(-0.6),
            fundamental: None,
            risk_penalty: Some(1.0),
        };
        let s = DampedScorer.score(&inputs, &W);
        assert!((s - (-0.3 * 0.8)).abs() < 1e-12);
        assert!(AdditiveScorer.score(&inputs, &W) < s);
    }

    #[test]
    fn strategy_selects_scorer() {
        assert_eq!(ScoringStrategy::Additive.scorer().name(), "additive");
        assert_eq!(ScoringStrategy::Damped.scorer().name(), "damped");
    }
}
