//! MACD — difference of a fast and a slow EMA, with an EMA signal line.
//!
//! - MACD line: EMA(fast) - EMA(slow), valid from bar slow - 1
//! - Signal line: EMA(signal) of the MACD line, valid from bar slow + signal - 2
//! - Histogram: MACD line - signal line
//!
//! Each line is a separate instance, like the Bollinger bands.

use crate::domain::Bar;
use crate::indicators::{closes, Indicator};
use crate::series::ema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow period");
        let label = match line {
            MacdLine::Macd => "macd",
            MacdLine::Signal => "macd_signal",
            MacdLine::Histogram => "macd_hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("{label}_{fast}_{slow}_{signal}"),
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Macd => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let nan = vec![f64::NAN; n];
        let closes = closes(bars);
        let (Ok(fast), Ok(slow)) = (ema(&closes, self.fast), ema(&closes, self.slow)) else {
            return nan;
        };
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        if self.line == MacdLine::Macd {
            return macd;
        }

        let start = self.slow - 1;
        let Ok(signal_tail) = ema(&macd[start..], self.signal) else {
            return nan;
        };
        let mut signal = vec![f64::NAN; start];
        signal.extend(signal_tail);

        match self.line {
            MacdLine::Signal => signal,
            _ => macd.iter().zip(&signal).map(|(m, s)| m - s).collect(),
        }
    }
}
