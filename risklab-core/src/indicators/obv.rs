//! On-Balance Volume (OBV).
//!
//! OBV[0] = 0; each later bar adds its volume on an up close, subtracts it on
//! a down close, and carries forward on an unchanged close. Lookback: 0.

use crate::domain::Bar;
use crate::indicators::Indicator;

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Obv {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = Vec::with_capacity(bars.len());
        let mut running = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                let prev = bars[i - 1].close;
                if bar.close.is_nan() || prev.is_nan() || bar.volume.is_nan() {
                    running = f64::NAN;
                } else if bar.close > prev {
                    running += bar.volume;
                } else if bar.close < prev {
                    running -= bar.volume;
                }
            }
            result.push(running);
        }
        result
    }
}

/// Least-squares slope of `values` against their index. `None` for fewer than
/// two points or any NaN.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars_with_volume, DEFAULT_EPSILON};

    #[test]
    fn obv_accumulates_signed_volume() {
        let bars = make_bars_with_volume(&[10.0, 11.0, 10.5, 10.5, 12.0], &[100.0, 200.0, 50.0, 70.0, 30.0]);
        let obv = Obv::new().compute(&bars);
        assert_eq!(obv, vec![0.0, 200.0, 150.0, 150.0, 180.0]);
    }

    #[test]
    fn obv_flat_price_stays_zero() {
        let bars = make_bars_with_volume(&[10.0; 5], &[1000.0; 5]);
        assert!(Obv::new().compute(&bars).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn slope_of_line() {
        assert_approx(linear_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap(), 2.0, DEFAULT_EPSILON);
        assert_approx(linear_slope(&[4.0, 4.0, 4.0]).unwrap(), 0.0, DEFAULT_EPSILON);
        assert!(linear_slope(&[1.0]).is_none());
    }
}
