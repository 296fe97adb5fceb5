//! Exponential Moving Average (EMA).
//!
//! Seed: SMA of the first `period` closes. Lookback: period - 1.

use crate::domain::Bar;
use crate::indicators::{closes, Indicator};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        crate::series::ema(&closes(bars), self.period)
            .unwrap_or_else(|_| vec![f64::NAN; bars.len()])
    }
}
