//! Bar — one daily OHLCV observation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar as supplied by the market-data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// True if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic sanity: high bounds the body, low bounds the body, prices positive.
    pub fn is_sane(&self) -> bool {
        !self.is_void()
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.close > 0.0
            && self.volume >= 0.0
    }
}
