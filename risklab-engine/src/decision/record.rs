//! Decision value types: the frozen inputs and the resulting record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use risklab_core::domain::{DatedReturns, FundamentalSnapshot, PriceSeries};
use risklab_core::signals::{FundamentalAssessment, TechnicalAssessment};
use risklab_core::sizers::PositionSizeRecommendation;

use crate::decision::scorer::ScoringStrategy;
use crate::risk::RiskSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

/// Lifecycle owned by the persistence collaborator. The engine only ever
/// emits `Proposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    #[default]
    Proposed,
    Accepted,
    Rejected,
    Executed,
}

/// Pipeline stages, in order. A record carries the stages it passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStage {
    CollectingInputs,
    Scored,
    Gated,
    /// Gate passed with a BUY or SELL.
    Accepted,
    /// Gate closed; action is HOLD.
    Rejected,
}

/// Why the gate resolved the way it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Passed,
    BelowConfidence { confidence: f64, threshold: f64 },
    /// Composite exactly zero.
    NoDirection,
    /// BUY passed the confidence gate but the symbol's Kelly edge is negative.
    NegativeEdge { raw_kelly: f64 },
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionFlag {
    /// The rationale collaborator failed or timed out.
    AiUnavailable,
    /// Fundamental score built from fewer than `min_ratios` ratios.
    LowConfidence,
    /// No price history was available.
    MissingPriceData,
    MissingFundamentals,
    /// At least one technical indicator was excluded.
    PartialTechnical,
    /// At least one risk metric is undefined.
    UndefinedRiskMetric,
}

/// Stop-loss plan for a directional action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossPlan {
    pub stop_loss_percent: f64,
    /// Below the last close for BUY, above it for SELL.
    pub stop_price: Option<f64>,
    /// Portfolio fraction lost if the stop is hit: size × stop percent.
    pub max_loss_fraction: f64,
}

/// Everything one decision is computed from. Frozen: identical inputs and
/// configuration always yield the same numeric record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionInputs {
    pub symbol: String,
    /// `None` when the market-data collaborator had nothing.
    pub series: Option<PriceSeries>,
    pub fundamentals: Option<FundamentalSnapshot>,
    pub benchmark: Option<DatedReturns>,
    /// Other holdings' returns, for the correlation matrix.
    pub peers: Vec<(String, DatedReturns)>,
    pub portfolio_value: Option<f64>,
    /// Current value held in this symbol; VaR amounts scale by it.
    pub position_value: Option<f64>,
}

impl DecisionInputs {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series = Some(series);
        self
    }

    pub fn with_fundamentals(mut self, fundamentals: FundamentalSnapshot) -> Self {
        self.fundamentals = Some(fundamentals);
        self
    }

    pub fn with_benchmark(mut self, benchmark: DatedReturns) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn with_peer(mut self, symbol: impl Into<String>, returns: DatedReturns) -> Self {
        self.peers.push((symbol.into(), returns));
        self
    }

    pub fn with_portfolio_value(mut self, value: f64) -> Self {
        self.portfolio_value = Some(value);
        self
    }

    pub fn with_position_value(mut self, value: f64) -> Self {
        self.position_value = Some(value);
        self
    }
}

/// The engine's output for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub technical_score: Option<f64>,
    pub fundamental_score: Option<f64>,
    pub risk_penalty: Option<f64>,
    /// Composite score in [-1, 1].
    pub risk_adjusted_score: f64,
    pub confidence: f64,
    pub action: Action,
    /// Present only for BUY/SELL; fraction already scaled by confidence.
    pub size_recommendation: Option<PositionSizeRecommendation>,
    pub notional: Option<f64>,
    pub shares: Option<u64>,
    pub stop_loss: Option<StopLossPlan>,
    /// Advisory text from the rationale collaborator; never affects numbers.
    pub rationale: Option<String>,
    pub status: DecisionStatus,
    pub gate: GateOutcome,
    pub flags: BTreeSet<DecisionFlag>,
    pub stages: Vec<DecisionStage>,
    pub scoring: ScoringStrategy,
    pub technical: Option<TechnicalAssessment>,
    pub fundamental: Option<FundamentalAssessment>,
    pub risk: Option<RiskSnapshot>,
    /// Hash of the inputs and configuration.
    pub fingerprint: String,
}

impl DecisionRecord {
    pub fn has_flag(&self, flag: DecisionFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Copy with a rationale attached, or flagged `AI_UNAVAILABLE` when none
    /// could be obtained.
    pub fn with_rationale(&self, rationale: Option<String>) -> Self {
        let mut out = self.clone();
        match rationale {
            Some(text) => out.rationale = Some(text),
            None => {
                out.rationale = None;
                out.flags.insert(DecisionFlag::AiUnavailable);
            }
        }
        out
    }
}
