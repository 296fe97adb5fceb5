//! Relative Strength Index (RSI), Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Lookback: period.
//! Edge cases: no movement → 50; avg_loss == 0 → 100; avg_gain == 0 → 0.

use crate::domain::Bar;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();

        let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
        for &ch in &changes[..self.period] {
            if ch.is_nan() {
                return result;
            }
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;
        result[self.period] = rsi_from_averages(avg_gain, avg_loss);

        let alpha = 1.0 / self.period as f64;
        for (offset, &ch) in changes.iter().enumerate().skip(self.period) {
            if ch.is_nan() {
                break;
            }
            avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * avg_loss;
            result[offset + 1] = rsi_from_averages(avg_gain, avg_loss);
        }
        result
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
