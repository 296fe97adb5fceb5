//! Risk Metrics Engine.
//!
//! Pure functions from return series to risk statistics, plus the
//! [`RiskSnapshot`] value object that bundles them for one (portfolio,
//! as-of date). Undefined metrics are recorded with their reason instead of
//! failing the snapshot.

pub mod correlation;
pub mod drawdown;
pub mod level;
pub mod portfolio;
pub mod ratios;
pub mod snapshot;
pub mod var;

pub use correlation::CorrelationMatrix;
pub use drawdown::{drawdown, equity_curve, DrawdownReport};
pub use level::RiskLevel;
pub use portfolio::{portfolio_returns, PositionReturns};
pub use ratios::{beta, sharpe_ratio, sortino_ratio};
pub use snapshot::{MetricGap, RiskInputs, RiskSnapshot};
pub use var::{expected_shortfall, historical_var, VarEstimate};

use serde::{Deserialize, Serialize};

use risklab_core::ParamError;

/// `[risk]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    /// Most recent returns used for every metric.
    pub lookback: usize,
    /// Below this many returns, return-based metrics are undefined.
    pub min_observations: usize,
    /// VaR holding period; quantiles scale by √horizon.
    pub horizon_days: usize,
    pub volatility_window: usize,
    /// Aligned observations needed before beta is reported.
    pub beta_min_observations: usize,
    /// |VaR₉₅| at which the VaR penalty component saturates.
    pub var_penalty_scale: f64,
    /// |max drawdown| at which the drawdown penalty component saturates.
    pub drawdown_penalty_scale: f64,
    /// Annualized volatility above which the level is MEDIUM.
    pub medium_volatility: f64,
    /// Annualized volatility above which the level is HIGH.
    pub high_volatility: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            lookback: 252,
            min_observations: 20,
            horizon_days: 1,
            volatility_window: 30,
            beta_min_observations: 30,
            var_penalty_scale: 0.05,
            drawdown_penalty_scale: 0.30,
            medium_volatility: 0.25,
            high_volatility: 0.40,
        }
    }
}

impl RiskParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.min_observations < 2 {
            return Err(ParamError::new("risk.min_observations", "must be >= 2"));
        }
        if self.lookback < self.min_observations {
            return Err(ParamError::new("risk.lookback", "must be >= min_observations"));
        }
        if self.horizon_days == 0 {
            return Err(ParamError::new("risk.horizon_days", "must be >= 1"));
        }
        if self.volatility_window < 2 {
            return Err(ParamError::new("risk.volatility_window", "must be >= 2"));
        }
        if self.beta_min_observations < 2 {
            return Err(ParamError::new("risk.beta_min_observations", "must be >= 2"));
        }
        if !(self.var_penalty_scale.is_finite() && self.var_penalty_scale > 0.0) {
            return Err(ParamError::new("risk.var_penalty_scale", "must be > 0"));
        }
        if !(self.drawdown_penalty_scale.is_finite() && self.drawdown_penalty_scale > 0.0) {
            return Err(ParamError::new("risk.drawdown_penalty_scale", "must be > 0"));
        }
        if !(self.medium_volatility.is_finite() && self.medium_volatility > 0.0) {
            return Err(ParamError::new("risk.medium_volatility", "must be > 0"));
        }
        if !(self.high_volatility.is_finite() && self.high_volatility > self.medium_volatility) {
            return Err(ParamError::new(
                "risk.high_volatility",
                "must be finite and above medium_volatility",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatility_bands_must_be_ordered() {
        assert!(RiskParams::default().validate().is_ok());
        let inverted = RiskParams {
            medium_volatility: 0.40,
            high_volatility: 0.25,
            ..RiskParams::default()
        };
        assert_eq!(inverted.validate().unwrap_err().field, "risk.high_volatility");
        let zero = RiskParams {
            medium_volatility: 0.0,
            ..RiskParams::default()
        };
        assert_eq!(zero.validate().unwrap_err().field, "risk.medium_volatility");
    }
}
