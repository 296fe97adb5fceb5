//! Fundamental Signal Module.
//!
//! Each ratio is mapped linearly between a "good" anchor (+1) and a "bad"
//! anchor (−1), then clamped. Anchors may be ordered either way: for P/E and
//! debt-to-equity lower is better, for growth and margins higher is better.
//!
//! Missing ratios drop out of the weighted average (same excluded-weight
//! policy as the technical module). Fewer than `min_ratios` usable ratios
//! still yields a score, flagged `low_confidence`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::score::weighted_average;
use crate::domain::{FundamentalSnapshot, Ratio, SignalScore};
use crate::params::{require_positive, require_weights, ParamError};
use crate::series::clamp_unit;

/// Linear normalization rule for one ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRule {
    pub ratio: Ratio,
    /// Value that maps to +1.
    pub good: f64,
    /// Value that maps to −1.
    pub bad: f64,
    pub weight: f64,
}

impl RatioRule {
    pub fn new(ratio: Ratio, good: f64, bad: f64) -> Self {
        Self {
            ratio,
            good,
            bad,
            weight: 1.0,
        }
    }

    /// `+1` at `good`, `−1` at `bad`, linear in between, clamped outside.
    pub fn normalize(&self, value: f64) -> f64 {
        normalize_between(value, self.good, self.bad)
    }
}

fn normalize_between(value: f64, good: f64, bad: f64) -> f64 {
    clamp_unit(1.0 - 2.0 * (value - good) / (bad - good))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalParams {
    pub rules: Vec<RatioRule>,
    /// When `sector_pe_median` is present, P/E anchors become these multiples
    /// of the median.
    pub sector_pe_good_multiple: f64,
    pub sector_pe_bad_multiple: f64,
    /// Below this many usable ratios the score is flagged low-confidence.
    pub min_ratios: usize,
}

impl Default for FundamentalParams {
    fn default() -> Self {
        Self {
            rules: vec![
                RatioRule::new(Ratio::PeRatio, 15.0, 25.0),
                RatioRule::new(Ratio::EarningsGrowth, 0.15, -0.05),
                RatioRule::new(Ratio::RevenueGrowth, 0.10, -0.05),
                RatioRule::new(Ratio::ProfitMargin, 0.15, 0.0),
                RatioRule::new(Ratio::ReturnOnEquity, 0.15, 0.0),
                RatioRule::new(Ratio::DebtToEquity, 0.5, 1.5),
                RatioRule::new(Ratio::CurrentRatio, 1.5, 0.8),
            ],
            sector_pe_good_multiple: 0.75,
            sector_pe_bad_multiple: 1.25,
            min_ratios: 3,
        }
    }
}

impl FundamentalParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.rules.is_empty() {
            return Err(ParamError::new("fundamental.rules", "at least one rule required"));
        }
        for rule in &self.rules {
            if rule.ratio == Ratio::SectorPeMedian {
                return Err(ParamError::new(
                    "fundamental.rules",
                    "sector_pe_median is a reference value, not a scored ratio",
                ));
            }
            if !(rule.good.is_finite() && rule.bad.is_finite()) || rule.good == rule.bad {
                return Err(ParamError::new(
                    format!("fundamental.rules.{}", rule.ratio.key()),
                    "good and bad anchors must be finite and distinct",
                ));
            }
        }
        let weights: Vec<f64> = self.rules.iter().map(|r| r.weight).collect();
        require_weights("fundamental.rules.weight", &weights)?;
        require_positive("fundamental.sector_pe_good_multiple", self.sector_pe_good_multiple)?;
        require_positive("fundamental.sector_pe_bad_multiple", self.sector_pe_bad_multiple)?;
        if self.sector_pe_good_multiple >= self.sector_pe_bad_multiple {
            return Err(ParamError::new(
                "fundamental.sector_pe_good_multiple",
                "must be below sector_pe_bad_multiple",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalAssessment {
    pub score: Option<f64>,
    pub components: Vec<SignalScore>,
    pub ratios_used: usize,
    pub ratios_total: usize,
    /// Used weight / total configured weight.
    pub coverage: f64,
    pub low_confidence: bool,
}

/// Score a snapshot against the configured rules.
pub fn assess_fundamentals(
    snapshot: &FundamentalSnapshot,
    params: &FundamentalParams,
) -> FundamentalAssessment {
    let sector_median = snapshot
        .get(Ratio::SectorPeMedian)
        .filter(|m| *m > 0.0);
    // Component weights are shares of the configured total, so raw weights
    // above 1 keep their proportions.
    let total_weight: f64 = params.rules.iter().map(|r| r.weight.max(0.0)).sum();

    let mut components = Vec::new();
    let mut used_weight = 0.0;
    for rule in &params.rules {
        if rule.weight <= 0.0 {
            continue;
        }
        let Some(value) = usable_value(snapshot, rule.ratio) else {
            debug!(ratio = rule.ratio.key(), "ratio absent");
            continue;
        };
        let value = match (rule.ratio, sector_median) {
            (Ratio::PeRatio, Some(median)) => normalize_between(
                value,
                median * params.sector_pe_good_multiple,
                median * params.sector_pe_bad_multiple,
            ),
            _ => rule.normalize(value),
        };
        used_weight += rule.weight;
        components.push(SignalScore::new(rule.ratio.key(), value, rule.weight / total_weight));
    }

    let ratios_used = components.len();
    FundamentalAssessment {
        score: weighted_average(&components),
        ratios_used,
        ratios_total: params.rules.len(),
        coverage: if total_weight > 0.0 { used_weight / total_weight } else { 0.0 },
        low_confidence: ratios_used < params.min_ratios,
        components,
    }
}

/// Non-positive P/E (losses) carries no valuation information.
fn usable_value(snapshot: &FundamentalSnapshot, ratio: Ratio) -> Option<f64> {
    let value = snapshot.get(ratio)?;
    if ratio == Ratio::PeRatio && value <= 0.0 {
        return None;
    }
    Some(value)
}
