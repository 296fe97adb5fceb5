//! Drawdown over the cumulative equity curve of a return series.

use serde::{Deserialize, Serialize};

use risklab_core::ComputeError;

/// Drawdown statistics. Indices refer to the equity curve, where index 0 is
/// the starting value 1.0 and index `i` is the value after return `i - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownReport {
    /// Largest peak-to-trough decline as a fraction; always ≤ 0.
    pub max_drawdown: f64,
    pub peak_index: usize,
    pub trough_index: usize,
    /// Decline of the last value from the running peak; ≤ 0.
    pub current_drawdown: f64,
}

/// Equity curve starting at 1.0, compounding `returns`.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut value = 1.0;
    curve.push(value);
    for r in returns {
        value *= 1.0 + r;
        curve.push(value);
    }
    curve
}

pub fn drawdown(returns: &[f64]) -> Result<DrawdownReport, ComputeError> {
    if returns.is_empty() {
        return Err(ComputeError::insufficient(1, 0));
    }
    let curve = equity_curve(returns);

    let mut peak = curve[0];
    let mut peak_idx = 0;
    let mut report = DrawdownReport {
        max_drawdown: 0.0,
        peak_index: 0,
        trough_index: 0,
        current_drawdown: 0.0,
    };
    for (i, &value) in curve.iter().enumerate() {
        if value > peak {
            peak = value;
            peak_idx = i;
        }
        let dd = if peak > 0.0 { (value - peak) / peak } else { 0.0 };
        if dd < report.max_drawdown {
            report.max_drawdown = dd;
            report.peak_index = peak_idx;
            report.trough_index = i;
        }
        report.current_drawdown = dd;
    }
    Ok(report)
}
