//! Pairwise correlation over date-aligned returns.
//!
//! Each pair is inner-joined on date independently. A pair with fewer than two
//! overlapping observations, or zero variance on either side, is `NaN`:
//! unknown, never zero. `get` surfaces that as `None`.

use serde::{Deserialize, Serialize};

use risklab_core::domain::DatedReturns;
use risklab_core::series::{align_returns, sample_covariance, sample_std_dev, VARIANCE_EPSILON};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    #[serde(with = "nan_as_null")]
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn compute(series: &[(String, DatedReturns)]) -> Self {
        let n = series.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let (a, b) = align_returns(&series[i].1, &series[j].1);
                let rho = pearson(&a, &b);
                values[i][j] = rho;
                values[j][i] = rho;
            }
        }
        Self {
            symbols: series.iter().map(|(s, _)| s.clone()).collect(),
            values,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Raw entry, possibly NaN.
    pub fn raw(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Entry `(i, j)`, `None` when unknown or out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values
            .get(i)
            .and_then(|row| row.get(j))
            .copied()
            .filter(|v| !v.is_nan())
    }

    pub fn get_by_symbol(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        self.get(i, j)
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return f64::NAN;
    }
    let (sa, sb) = (sample_std_dev(a), sample_std_dev(b));
    if sa < VARIANCE_EPSILON || sb < VARIANCE_EPSILON {
        return f64::NAN;
    }
    (sample_covariance(a, b) / (sa * sb)).clamp(-1.0, 1.0)
}

/// JSON has no NaN; unknown entries travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<f64>>> = values
            .iter()
            .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
            .collect();
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Option<f64>>>::deserialize(d)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}
