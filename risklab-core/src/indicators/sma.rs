//! Simple Moving Average (SMA).
//!
//! Mean of the last `period` closes. Lookback: period - 1.

use crate::domain::Bar;
use crate::indicators::{closes, Indicator};
use crate::series::rolling_mean;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        let closes = closes(bars);
        if let Ok(means) = rolling_mean(&closes, self.period) {
            for (slot, value) in result.iter_mut().skip(self.period - 1).zip(means) {
                *slot = value;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_known_values() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Sma::new(3).compute(&bars);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_short_series_is_all_nan() {
        let bars = make_bars(&[10.0, 11.0]);
        assert!(Sma::new(3).compute(&bars).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
        assert_eq!(Sma::new(20).min_bars(), 20);
    }
}
