//! Kelly sizing from a symbol's own win/loss history.
//!
//! f* = (p·W − q·L) / (W·L)
//!
//! where p/q are the win/loss frequencies and W/L the mean win and mean loss
//! magnitude of the non-zero returns. The result is multiplied by the
//! fractional-Kelly multiplier and clipped to `[0, max]`. Negative or
//! undefined edges fall back to the default fraction.

use serde::{Deserialize, Serialize};

use crate::sizers::{PositionSizeRecommendation, Sizer};

/// How the final fraction was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KellyOutcome {
    /// Kelly fraction used as-is (after the multiplier).
    Sized,
    /// Kelly fraction exceeded the maximum and was capped.
    Capped,
    /// Kelly fraction was negative; floored at the default.
    NegativeEdge,
    /// Fewer than `min_trades` non-zero returns; floored at the default.
    InsufficientHistory,
    /// No wins or no losses; floored at the default.
    Undefined,
    /// Fixed-fraction sizing, Kelly not consulted.
    Fixed,
}

/// Win/loss statistics over non-zero returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinLossStats {
    pub wins: usize,
    pub losses: usize,
    /// Mean positive return.
    pub avg_win: f64,
    /// Mean loss magnitude (positive).
    pub avg_loss: f64,
}

impl WinLossStats {
    pub fn from_returns(returns: &[f64]) -> Self {
        let (mut wins, mut losses) = (0usize, 0usize);
        let (mut win_sum, mut loss_sum) = (0.0, 0.0);
        for &r in returns.iter().filter(|r| r.is_finite()) {
            if r > 0.0 {
                wins += 1;
                win_sum += r;
            } else if r < 0.0 {
                losses += 1;
                loss_sum += -r;
            }
        }
        Self {
            wins,
            losses,
            avg_win: if wins > 0 { win_sum / wins as f64 } else { 0.0 },
            avg_loss: if losses > 0 { loss_sum / losses as f64 } else { 0.0 },
        }
    }

    pub fn trades(&self) -> usize {
        self.wins + self.losses
    }

    pub fn win_probability(&self) -> f64 {
        match self.trades() {
            0 => 0.0,
            n => self.wins as f64 / n as f64,
        }
    }
}

/// Raw Kelly fraction; `None` when there are no wins or no losses.
pub fn kelly_fraction(stats: &WinLossStats) -> Option<f64> {
    if stats.wins == 0 || stats.losses == 0 || stats.avg_win <= 0.0 || stats.avg_loss <= 0.0 {
        return None;
    }
    let p = stats.win_probability();
    let q = 1.0 - p;
    Some((p * stats.avg_win - q * stats.avg_loss) / (stats.avg_win * stats.avg_loss))
}

#[derive(Debug, Clone)]
pub struct KellySizer {
    default_fraction: f64,
    max_fraction: f64,
    min_trades: usize,
    multiplier: f64,
}

impl KellySizer {
    /// Fractions are clamped into `[0, 1]`, and the default into `[0, max]`.
    pub fn new(default_fraction: f64, max_fraction: f64) -> Self {
        let max_fraction = max_fraction.clamp(0.0, 1.0);
        Self {
            default_fraction: default_fraction.clamp(0.0, max_fraction),
            max_fraction,
            min_trades: 20,
            multiplier: 1.0,
        }
    }

    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.clamp(0.0, 1.0);
        self
    }

    fn fallback(&self, raw_kelly: Option<f64>, outcome: KellyOutcome) -> PositionSizeRecommendation {
        PositionSizeRecommendation {
            fraction: self.default_fraction,
            raw_kelly,
            outcome,
        }
    }
}

impl Sizer for KellySizer {
    fn recommend(&self, returns: &[f64]) -> PositionSizeRecommendation {
        let stats = WinLossStats::from_returns(returns);
        if stats.trades() < self.min_trades {
            return self.fallback(None, KellyOutcome::InsufficientHistory);
        }
        let Some(raw) = kelly_fraction(&stats) else {
            return self.fallback(None, KellyOutcome::Undefined);
        };
        if !raw.is_finite() {
            return self.fallback(None, KellyOutcome::Undefined);
        }
        if raw < 0.0 {
            return self.fallback(Some(raw), KellyOutcome::NegativeEdge);
        }
        let scaled = raw * self.multiplier;
        if scaled > self.max_fraction {
            PositionSizeRecommendation {
                fraction: self.max_fraction,
                raw_kelly: Some(raw),
                outcome: KellyOutcome::Capped,
            }
        } else {
            PositionSizeRecommendation {
                fraction: scaled,
                raw_kelly: Some(raw),
                outcome: KellyOutcome::Sized,
            }
        }
    }

    fn name(&self) -> &str {
        "kelly"
    }
}
