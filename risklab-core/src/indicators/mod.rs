//! Indicators — pure functions from bar history to a numeric series.
//!
//! Every indicator returns a series aligned with its input; the first
//! `lookback()` entries are NaN (warmup). No value at bar t may depend on bars
//! after t.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use macd::{Macd, MacdLine};
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Bar;
use crate::error::ComputeError;

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of warmup bars before the first valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the entire bar series. Output length equals
    /// `bars.len()`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Minimum number of bars for one valid output.
    fn min_bars(&self) -> usize {
        self.lookback() + 1
    }

    /// The value at the last bar.
    ///
    /// Fails with `InsufficientData` when the series is shorter than
    /// `min_bars()`, and with `UndefinedMetric` if the last value is NaN.
    fn latest(&self, bars: &[Bar]) -> Result<f64, ComputeError> {
        if bars.len() < self.min_bars() {
            return Err(ComputeError::insufficient(self.min_bars(), bars.len()));
        }
        let values = self.compute(bars);
        match values.last() {
            Some(v) if !v.is_nan() => Ok(*v),
            _ => Err(ComputeError::undefined(self.name(), "NaN in input window")),
        }
    }
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
pub(crate) use crate::domain::price_series::{make_bars, make_bars_with_volume};
#[cfg(test)]
pub(crate) use crate::series::assert_approx;

/// Default epsilon for indicator tests.
#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_reports_insufficient_history() {
        let bars = make_bars(&[1.0, 2.0]);
        let err = Sma::new(5).latest(&bars).unwrap_err();
        assert_eq!(err, ComputeError::insufficient(5, 2));
    }

    #[test]
    fn latest_returns_last_value() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_approx(Sma::new(2).latest(&bars).unwrap(), 2.5, DEFAULT_EPSILON);
    }

    /// Truncating the series must not change any earlier value.
    #[test]
    fn no_indicator_looks_ahead() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(10)),
            Box::new(Ema::new(10)),
            Box::new(Rsi::new(14)),
            Box::new(Macd::new(12, 26, 9, MacdLine::Histogram)),
            Box::new(Bollinger::new(20, 2.0, BollingerBand::Upper)),
            Box::new(Obv::new()),
        ];
        for ind in &indicators {
            let full = ind.compute(&bars);
            let cut = ind.compute(&bars[..45]);
            for i in 0..45 {
                assert!(
                    full[i].to_bits() == cut[i].to_bits(),
                    "{} differs at {i}",
                    ind.name()
                );
            }
        }
    }
}
