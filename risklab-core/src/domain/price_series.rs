//! PriceSeries — the ordered bar history of a single symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::{ComputeError, SeriesError};

/// Returns keyed by the date of the later bar of each pair.
pub type DatedReturns = Vec<(NaiveDate, f64)>;

/// Bars for one symbol, strictly increasing by date with no duplicates.
///
/// The ordering invariant is checked once in [`PriceSeries::new`]; the bars
/// cannot be mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].date == pair[0].date {
                return Err(SeriesError::DuplicateTimestamp {
                    symbol,
                    date: pair[1].date,
                });
            }
            if pair[1].date < pair[0].date {
                return Err(SeriesError::NotIncreasing {
                    symbol,
                    index: i + 1,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Simple close-to-close returns.
    pub fn returns(&self) -> Result<Vec<f64>, ComputeError> {
        crate::series::returns(&self.closes())
    }

    /// Close-to-close returns tagged with the date they were realized on.
    pub fn dated_returns(&self) -> DatedReturns {
        self.bars
            .windows(2)
            .map(|w| {
                let r = if w[0].close > 0.0 {
                    (w[1].close - w[0].close) / w[0].close
                } else {
                    0.0
                };
                (w[1].date, r)
            })
            .collect()
    }

    /// The most recent `n` bars (all of them when shorter).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.bars.len().saturating_sub(n);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }
}

#[cfg(test)]
pub(crate) fn make_bars(closes: &[f64]) -> Vec<Bar> {
    make_bars_with_volume(closes, &vec![1000.0; closes.len()])
}

/// Synthetic bars: open = previous close, high/low one point outside the body.
#[cfg(test)]
pub(crate) fn make_bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                volume,
            )
        })
        .collect()
}
