//! RiskSnapshot — every risk metric for one return series, computed over the
//! lookback window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use risklab_core::domain::DatedReturns;
use risklab_core::series::{align_returns, annualized_volatility};
use risklab_core::ComputeError;

use crate::risk::{
    beta, drawdown, expected_shortfall, historical_var, sharpe_ratio, sortino_ratio,
    CorrelationMatrix, DrawdownReport, RiskLevel, RiskParams, VarEstimate,
};

/// A metric that could not be computed, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricGap {
    pub metric: String,
    pub reason: ComputeError,
}

/// Everything the snapshot is computed from.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    /// Position or portfolio returns, oldest first.
    pub returns: &'a [(NaiveDate, f64)],
    /// Current market value the VaR amounts are scaled by.
    pub exposure: f64,
    pub benchmark: Option<&'a [(NaiveDate, f64)]>,
    /// Series to correlate; empty means no correlation matrix.
    pub correlation_universe: &'a [(String, DatedReturns)],
}

impl<'a> RiskInputs<'a> {
    pub fn new(returns: &'a [(NaiveDate, f64)], exposure: f64) -> Self {
        Self {
            returns,
            exposure,
            benchmark: None,
            correlation_universe: &[],
        }
    }

    pub fn with_benchmark(mut self, benchmark: &'a [(NaiveDate, f64)]) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn with_correlation_universe(mut self, universe: &'a [(String, DatedReturns)]) -> Self {
        self.correlation_universe = universe;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub as_of: Option<NaiveDate>,
    pub observations: usize,
    pub exposure: f64,
    pub var_95: Option<VarEstimate>,
    pub var_99: Option<VarEstimate>,
    pub cvar_95: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub drawdown: Option<DrawdownReport>,
    pub volatility: Option<f64>,
    /// Volatility band; absent when volatility is undefined.
    pub risk_level: Option<RiskLevel>,
    pub beta: Option<f64>,
    pub correlation: Option<CorrelationMatrix>,
    pub gaps: Vec<MetricGap>,
}

impl RiskSnapshot {
    pub fn compute(inputs: &RiskInputs<'_>, params: &RiskParams, risk_free_rate: f64) -> Self {
        let start = inputs.returns.len().saturating_sub(params.lookback);
        let window = &inputs.returns[start..];
        let values: Vec<f64> = window.iter().map(|(_, r)| *r).collect();

        let mut snap = Self {
            as_of: window.last().map(|(d, _)| *d),
            observations: values.len(),
            exposure: inputs.exposure,
            var_95: None,
            var_99: None,
            cvar_95: None,
            sharpe: None,
            sortino: None,
            drawdown: None,
            volatility: None,
            risk_level: None,
            beta: None,
            correlation: None,
            gaps: Vec::new(),
        };

        if values.len() < params.min_observations {
            let reason = ComputeError::insufficient(params.min_observations, values.len());
            for metric in ["var_95", "var_99", "cvar_95", "sharpe", "sortino", "drawdown", "volatility"] {
                snap.gap(metric, reason.clone());
            }
        } else {
            let h = params.horizon_days;
            snap.var_95 = snap.record("var_95", historical_var(&values, 0.95, h, inputs.exposure));
            snap.var_99 = snap.record("var_99", historical_var(&values, 0.99, h, inputs.exposure));
            snap.cvar_95 = snap.record("cvar_95", expected_shortfall(&values, 0.95));
            snap.sharpe = snap.record("sharpe", sharpe_ratio(&values, risk_free_rate));
            snap.sortino = snap.record("sortino", sortino_ratio(&values, risk_free_rate));
            snap.drawdown = snap.record("drawdown", drawdown(&values));
            snap.volatility = snap.record(
                "volatility",
                annualized_volatility(&values, params.volatility_window),
            );
            snap.risk_level = snap.volatility.map(|v| RiskLevel::classify(v, params));
        }

        if let Some(bench) = inputs.benchmark {
            let (asset, bench) = align_returns(window, bench);
            let result = if asset.len() < params.beta_min_observations {
                Err(ComputeError::insufficient(params.beta_min_observations, asset.len()))
            } else {
                beta(&asset, &bench)
            };
            snap.beta = snap.record("beta", result);
        }

        if !inputs.correlation_universe.is_empty() {
            let trimmed: Vec<(String, DatedReturns)> = inputs
                .correlation_universe
                .iter()
                .map(|(s, r)| (s.clone(), r[r.len().saturating_sub(params.lookback)..].to_vec()))
                .collect();
            snap.correlation = Some(CorrelationMatrix::compute(&trimmed));
        }

        snap
    }

    pub fn max_drawdown(&self) -> Option<f64> {
        self.drawdown.map(|d| d.max_drawdown)
    }

    pub fn is_undefined(&self, metric: &str) -> bool {
        self.gaps.iter().any(|g| g.metric == metric)
    }

    fn record<T>(&mut self, metric: &str, result: Result<T, ComputeError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(reason) => {
                self.gap(metric, reason);
                None
            }
        }
    }

    fn gap(&mut self, metric: &str, reason: ComputeError) {
        debug!(metric, %reason, "risk metric undefined");
        self.gaps.push(MetricGap {
            metric: metric.to_string(),
            reason,
        });
    }
}
