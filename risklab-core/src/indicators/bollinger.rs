//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N). Lookback: period - 1.

use crate::domain::Bar;
use crate::indicators::{closes, Indicator};

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let closes = closes(bars);
        for (i, window) in closes.windows(self.period).enumerate() {
            if window.iter().any(|c| c.is_nan()) {
                continue;
            }
            let mean = window.iter().sum::<f64>() / self.period as f64;
            let offset = match self.band {
                BollingerBand::Middle => 0.0,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
                        / self.period as f64;
                    self.multiplier * variance.sqrt()
                }
            };
            result[i + self.period - 1] = match self.band {
                BollingerBand::Lower => mean - offset,
                _ => mean + offset,
            };
        }
        result
    }
}
