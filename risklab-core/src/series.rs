//! Series utilities — rolling-window primitives shared by indicators, risk
//! metrics and sizing.
//!
//! Every function is pure: identical inputs always produce identical outputs,
//! which the decision cache relies on when it keys results by input hash.

use chrono::NaiveDate;

use crate::error::ComputeError;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Below this a standard deviation or variance is treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-15;

/// Simple percentage returns: `r[i] = (p[i+1] - p[i]) / p[i]`.
///
/// Output length is `len(series) - 1`. A non-positive previous price yields a
/// 0.0 return rather than an infinity.
pub fn returns(series: &[f64]) -> Result<Vec<f64>, ComputeError> {
    if series.len() < 2 {
        return Err(ComputeError::insufficient(2, series.len()));
    }
    Ok(series
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect())
}

/// Lazily evaluated rolling mean. Yields `len - window + 1` values.
pub fn rolling_mean(
    series: &[f64],
    window: usize,
) -> Result<impl Iterator<Item = f64> + '_, ComputeError> {
    check_window(series, window, 1)?;
    Ok(series.windows(window).map(mean))
}

/// Lazily evaluated rolling sample standard deviation (divides by `window - 1`).
/// Yields `len - window + 1` values. Requires `window >= 2`.
pub fn rolling_std_dev(
    series: &[f64],
    window: usize,
) -> Result<impl Iterator<Item = f64> + '_, ComputeError> {
    check_window(series, window, 2)?;
    Ok(series.windows(window).map(sample_std_dev))
}

fn check_window(series: &[f64], window: usize, minimum: usize) -> Result<(), ComputeError> {
    if window < minimum {
        return Err(ComputeError::InvalidWindow { window, minimum });
    }
    if window > series.len() {
        return Err(ComputeError::insufficient(window, series.len()));
    }
    Ok(())
}

/// Exponential moving average aligned with the input.
///
/// Seed: simple mean of the first `period` values, placed at index `period - 1`.
/// Recursion: `ema[t] = alpha * x[t] + (1 - alpha) * ema[t-1]`, `alpha = 2 / (period + 1)`.
/// Indices before the seed are NaN. A NaN input taints everything after it.
pub fn ema(series: &[f64], period: usize) -> Result<Vec<f64>, ComputeError> {
    check_window(series, period, 1)?;
    let n = series.len();
    let mut result = vec![f64::NAN; n];

    let seed_window = &series[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return Ok(result);
    }
    let seed = mean(seed_window);
    result[period - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        if series[i].is_nan() {
            break;
        }
        let value = alpha * series[i] + (1.0 - alpha) * prev;
        result[i] = value;
        prev = value;
    }
    Ok(result)
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); 0.0 for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Sample variance (n - 1); 0.0 for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample covariance of two equally long slices; 0.0 when shorter than two.
///
/// Extra trailing elements of the longer slice are ignored.
pub fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Percentile with linear interpolation between closest ranks (`pct` in 0..=100).
///
/// Returns `None` for an empty slice. NaNs sort last.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Annualized volatility: the last rolling sample stddev of `returns` over
/// `window` observations, scaled by √252.
pub fn annualized_volatility(returns: &[f64], window: usize) -> Result<f64, ComputeError> {
    let last = rolling_std_dev(returns, window)?
        .last()
        .ok_or_else(|| ComputeError::insufficient(window, returns.len()))?;
    Ok(last * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Clamp a raw score into [-1, 1].
pub fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

/// Inner-join two dated return series on date. Both inputs must be sorted by
/// date; the output keeps that order.
pub fn align_returns(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> (Vec<f64>, Vec<f64>) {
    let (mut i, mut j) = (0, 0);
    let mut left = Vec::new();
    let mut right = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                left.push(a[i].1);
                right.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (left, right)
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn returns_simple() {
        let r = returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(r.len(), 2);
        assert_approx(r[0], 0.10, EPS);
        assert_approx(r[1], -0.10, EPS);
    }

    #[test]
    fn returns_requires_two_points() {
        assert_eq!(returns(&[1.0]), Err(ComputeError::insufficient(2, 1)));
        assert_eq!(returns(&[]), Err(ComputeError::insufficient(2, 0)));
    }

    #[test]
    fn returns_zero_price_is_zero_return() {
        let r = returns(&[0.0, 10.0]).unwrap();
        assert_eq!(r, vec![0.0]);
    }

    #[test]
    fn rolling_mean_length_and_values() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out: Vec<f64> = rolling_mean(&data, 3).unwrap().collect();
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn rolling_window_larger_than_series_fails() {
        assert!(matches!(
            rolling_mean(&[1.0, 2.0], 3),
            Err(ComputeError::InsufficientData { required: 3, actual: 2 })
        ));
        assert!(rolling_std_dev(&[1.0, 2.0], 3).is_err());
    }

    #[test]
    fn rolling_std_rejects_window_one() {
        assert!(matches!(
            rolling_std_dev(&[1.0, 2.0], 1),
            Err(ComputeError::InvalidWindow { window: 1, minimum: 2 })
        ));
    }

    #[test]
    fn rolling_std_dev_known_values() {
        // sample std of (2, 4, 4, 4, 5, 5, 7, 9) = 2.138089935...
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out: Vec<f64> = rolling_std_dev(&data, 8).unwrap().collect();
        assert_eq!(out.len(), 1);
        assert_approx(out[0], 2.138_089_935_299_395, 1e-12);
    }

    #[test]
    fn ema_seed_and_recursion() {
        // alpha = 0.5, seed = mean(10, 11, 12) = 11
        let out = ema(&[10.0, 11.0, 12.0, 13.0, 14.0], 3).unwrap();
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_approx(out[2], 11.0, EPS);
        assert_approx(out[3], 12.0, EPS);
        assert_approx(out[4], 13.0, EPS);
    }

    #[test]
    fn ema_no_look_ahead() {
        let full = [10.0, 12.0, 11.0, 15.0, 14.0, 18.0, 17.0];
        let a = ema(&full, 3).unwrap();
        let b = ema(&full[..5], 3).unwrap();
        for i in 2..5 {
            assert_eq!(a[i].to_bits(), b[i].to_bits());
        }
    }

    #[test]
    fn ema_nan_taints_tail() {
        let out = ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 2).unwrap();
        assert!(!out[2].is_nan());
        assert!(out[3].is_nan());
        assert!(out[4].is_nan());
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx(percentile(&v, 0.0).unwrap(), 1.0, EPS);
        assert_approx(percentile(&v, 50.0).unwrap(), 3.0, EPS);
        assert_approx(percentile(&v, 10.0).unwrap(), 1.4, EPS);
        assert!(percentile(&[], 5.0).is_none());
    }

    #[test]
    fn covariance_of_self_is_variance() {
        let v = [0.01, -0.02, 0.015, 0.0, -0.005];
        assert_approx(sample_covariance(&v, &v), sample_variance(&v), EPS);
    }

    #[test]
    fn align_returns_inner_join() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let a = vec![(d(2), 1.0), (d(3), 2.0), (d(5), 3.0)];
        let b = vec![(d(3), 20.0), (d(4), 30.0), (d(5), 40.0)];
        let (l, r) = align_returns(&a, &b);
        assert_eq!(l, vec![2.0, 3.0]);
        assert_eq!(r, vec![20.0, 40.0]);
    }

    #[test]
    fn annualized_volatility_of_flat_returns_is_zero() {
        let r = vec![0.0; 40];
        assert_eq!(annualized_volatility(&r, 30).unwrap(), 0.0);
    }
}
