//! Historical-simulation Value at Risk and expected shortfall.

use serde::{Deserialize, Serialize};

use risklab_core::series::{mean, percentile};
use risklab_core::ComputeError;

/// One VaR figure at a confidence level.
///
/// `quantile` is the return at the `(1 - confidence)` percentile, scaled by
/// √horizon and capped at 0.0 (a positive quantile means no loss). `amount`
/// is the same figure in currency: `quantile × exposure`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarEstimate {
    pub confidence: f64,
    pub horizon_days: usize,
    pub quantile: f64,
    pub amount: f64,
}

impl VarEstimate {
    /// Loss magnitude as a positive fraction of exposure.
    pub fn loss_fraction(&self) -> f64 {
        -self.quantile
    }
}

/// Historical VaR at `confidence` (e.g. 0.95) over `horizon_days`.
pub fn historical_var(
    returns: &[f64],
    confidence: f64,
    horizon_days: usize,
    exposure: f64,
) -> Result<VarEstimate, ComputeError> {
    let tail_pct = (1.0 - confidence) * 100.0;
    let q = percentile(returns, tail_pct).ok_or_else(|| ComputeError::insufficient(1, 0))?;
    let quantile = (q * (horizon_days.max(1) as f64).sqrt()).min(0.0);
    Ok(VarEstimate {
        confidence,
        horizon_days: horizon_days.max(1),
        quantile,
        amount: quantile * exposure,
    })
}

/// Expected shortfall (CVaR): mean of the returns at or below the
/// `(1 - confidence)` percentile.
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> Result<f64, ComputeError> {
    let cutoff = percentile(returns, (1.0 - confidence) * 100.0)
        .ok_or_else(|| ComputeError::insufficient(1, 0))?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= cutoff).collect();
    if tail.is_empty() {
        // Interpolated cutoff fell below every observation; use the worst one.
        let worst = returns.iter().copied().fold(f64::INFINITY, f64::min);
        return Ok(worst);
    }
    Ok(mean(&tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread_returns() -> Vec<f64> {
        // -0.10, -0.09, ..., +0.09 (20 values)
        (0..20).map(|i| (i as f64 - 10.0) / 100.0).collect()
    }

    #[test]
    fn var_uses_interpolated_tail_percentile() {
        let r = spread_returns();
        // rank = 0.05 * 19 = 0.95 -> -0.10 + 0.95 * 0.01
        let v = historical_var(&r, 0.95, 1, 10_000.0).unwrap();
        assert!((v.quantile - (-0.0905)).abs() < 1e-12);
        assert!((v.amount - (-905.0)).abs() < 1e-9);
        assert!((v.loss_fraction() - 0.0905).abs() < 1e-12);
    }

    #[test]
    fn var_99_is_at_least_var_95() {
        let r = spread_returns();
        let v95 = historical_var(&r, 0.95, 1, 1.0).unwrap();
        let v99 = historical_var(&r, 0.99, 1, 1.0).unwrap();
        assert!(v99.quantile <= v95.quantile);
    }

    #[test]
    fn horizon_scales_by_sqrt() {
        let r = spread_returns();
        let one = historical_var(&r, 0.95, 1, 1.0).unwrap();
        let four = historical_var(&r, 0.95, 4, 1.0).unwrap();
        assert!((four.quantile - 2.0 * one.quantile).abs() < 1e-12);
    }

    #[test]
    fn all_gains_cap_at_zero() {
        let v = historical_var(&[0.01, 0.02, 0.03], 0.95, 1, 100.0).unwrap();
        assert_eq!(v.quantile, 0.0);
        assert_eq!(v.amount, 0.0);
    }

    #[test]
    fn empty_is_insufficient() {
        assert!(historical_var(&[], 0.95, 1, 1.0).unwrap_err().is_insufficient_data());
        assert!(expected_shortfall(&[], 0.95).is_err());
    }

    #[test]
    fn shortfall_is_beyond_var() {
        let r = spread_returns();
        let es = expected_shortfall(&r, 0.95).unwrap();
        let v = historical_var(&r, 0.95, 1, 1.0).unwrap();
        assert!(es <= v.quantile);
        assert!((es - (-0.10)).abs() < 1e-12);
    }
}
