//! Risk-adjusted return ratios and beta.
//!
//! Sharpe = mean(r − rf/252) / std(r − rf/252) × √252, sample std.
//! Sortino replaces the denominator with downside deviation
//! `sqrt(Σ min(excess, 0)² / n)`. A zero denominator is `UndefinedMetric`,
//! never 0.0 or infinity.

use risklab_core::series::{
    mean, sample_covariance, sample_std_dev, sample_variance, TRADING_DAYS_PER_YEAR,
    VARIANCE_EPSILON,
};
use risklab_core::ComputeError;

fn excess_returns(returns: &[f64], risk_free_rate: f64) -> Vec<f64> {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    returns.iter().map(|r| r - daily_rf).collect()
}

/// Annualized Sharpe ratio from daily returns and an annual risk-free rate.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Result<f64, ComputeError> {
    if returns.len() < 2 {
        return Err(ComputeError::insufficient(2, returns.len()));
    }
    let excess = excess_returns(returns, risk_free_rate);
    let std = sample_std_dev(&excess);
    if std < VARIANCE_EPSILON {
        return Err(ComputeError::undefined("sharpe", "zero variance"));
    }
    Ok(mean(&excess) / std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized Sortino ratio.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> Result<f64, ComputeError> {
    if returns.len() < 2 {
        return Err(ComputeError::insufficient(2, returns.len()));
    }
    let excess = excess_returns(returns, risk_free_rate);
    let downside_sq: f64 = excess.iter().map(|r| r.min(0.0).powi(2)).sum();
    let downside_dev = (downside_sq / excess.len() as f64).sqrt();
    if downside_dev < VARIANCE_EPSILON {
        return Err(ComputeError::undefined("sortino", "no downside deviation"));
    }
    Ok(mean(&excess) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt())
}

/// `cov(asset, benchmark) / var(benchmark)` over date-aligned returns.
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Result<f64, ComputeError> {
    let n = asset.len().min(benchmark.len());
    if n < 2 {
        return Err(ComputeError::insufficient(2, n));
    }
    let var = sample_variance(&benchmark[..n]);
    if var < VARIANCE_EPSILON {
        return Err(ComputeError::undefined("beta", "zero benchmark variance"));
    }
    Ok(sample_covariance(&asset[..n], &benchmark[..n]) / var)
}
