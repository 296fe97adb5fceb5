//! Technical Signal Module — six indicators, each mapped to [-1, 1], folded
//! into one technical score.
//!
//! Normalization rules (positive = bullish):
//!
//! | indicator      | rule                                                        |
//! |----------------|-------------------------------------------------------------|
//! | SMA trend      | `(sma_short - sma_long) / sma_long / sma_spread_scale`      |
//! | EMA crossover  | `(ema_fast - ema_slow) / ema_slow / ema_spread_scale`       |
//! | RSI            | `(50 - rsi) / 50` (oversold reads bullish)                  |
//! | MACD           | `histogram / stddev(close changes over macd_slow bars)`     |
//! | Bollinger      | `1 - 2 * (close - lower) / (upper - lower)`                 |
//! | OBV slope      | sign of the least-squares OBV slope over `obv_window` bars  |
//!
//! Every rule is clamped to [-1, 1]. Zero-denominator cases (flat prices,
//! zero-width bands) score 0.0 instead of failing.
//!
//! Indicators without enough history are excluded: their weight leaves the
//! denominator of the weighted average instead of pulling the score toward 0.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::score::weighted_average;
use crate::domain::{Bar, SignalScore};
use crate::error::ComputeError;
use crate::indicators::obv::linear_slope;
use crate::indicators::{
    Bollinger, BollingerBand, Ema, Indicator, Macd, MacdLine, Obv, Rsi, Sma,
};
use crate::params::{require_period, require_positive, require_weights, ParamError};
use crate::series::{clamp_unit, sample_std_dev, VARIANCE_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalIndicator {
    SmaTrend,
    EmaCrossover,
    Rsi,
    Macd,
    Bollinger,
    ObvSlope,
}

impl TechnicalIndicator {
    pub const ALL: [TechnicalIndicator; 6] = [
        Self::SmaTrend,
        Self::EmaCrossover,
        Self::Rsi,
        Self::Macd,
        Self::Bollinger,
        Self::ObvSlope,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SmaTrend => "sma_trend",
            Self::EmaCrossover => "ema_crossover",
            Self::Rsi => "rsi",
            Self::Macd => "macd",
            Self::Bollinger => "bollinger",
            Self::ObvSlope => "obv_slope",
        }
    }

    /// Bars needed before this indicator can be scored.
    pub fn min_bars(&self, params: &TechnicalParams) -> usize {
        match self {
            Self::SmaTrend => params.sma_long,
            Self::EmaCrossover => params.ema_slow,
            Self::Rsi => params.rsi_period + 1,
            Self::Macd => params.macd_slow + params.macd_signal - 1,
            Self::Bollinger => params.bollinger_period,
            Self::ObvSlope => params.obv_window + 1,
        }
    }

    fn score(&self, bars: &[Bar], params: &TechnicalParams) -> Result<f64, ComputeError> {
        let required = self.min_bars(params);
        if bars.len() < required {
            return Err(ComputeError::insufficient(required, bars.len()));
        }
        match self {
            Self::SmaTrend => spread_score(
                Sma::new(params.sma_short).latest(bars)?,
                Sma::new(params.sma_long).latest(bars)?,
                params.sma_spread_scale,
            ),
            Self::EmaCrossover => spread_score(
                Ema::new(params.ema_fast).latest(bars)?,
                Ema::new(params.ema_slow).latest(bars)?,
                params.ema_spread_scale,
            ),
            Self::Rsi => {
                let rsi = Rsi::new(params.rsi_period).latest(bars)?;
                Ok(clamp_unit((50.0 - rsi) / 50.0))
            }
            Self::Macd => {
                let hist = Macd::new(
                    params.macd_fast,
                    params.macd_slow,
                    params.macd_signal,
                    MacdLine::Histogram,
                )
                .latest(bars)?;
                let recent = &bars[bars.len() - (params.macd_slow + 1)..];
                let changes: Vec<f64> = recent.windows(2).map(|w| w[1].close - w[0].close).collect();
                let sigma = sample_std_dev(&changes);
                if sigma < VARIANCE_EPSILON {
                    return Ok(0.0);
                }
                Ok(clamp_unit(hist / sigma))
            }
            Self::Bollinger => {
                let period = params.bollinger_period;
                let mult = params.bollinger_multiplier;
                let upper = Bollinger::new(period, mult, BollingerBand::Upper).latest(bars)?;
                let lower = Bollinger::new(period, mult, BollingerBand::Lower).latest(bars)?;
                let width = upper - lower;
                if width <= VARIANCE_EPSILON * upper.abs().max(1.0) {
                    return Ok(0.0);
                }
                let close = bars[bars.len() - 1].close;
                let position = (close - lower) / width;
                Ok(clamp_unit(1.0 - 2.0 * position))
            }
            Self::ObvSlope => {
                let obv = Obv::new().compute(bars);
                let window = &obv[obv.len() - params.obv_window..];
                let slope = linear_slope(window)
                    .ok_or_else(|| ComputeError::undefined("obv_slope", "NaN in OBV window"))?;
                if slope.abs() < f64::EPSILON {
                    Ok(0.0)
                } else {
                    Ok(slope.signum())
                }
            }
        }
    }
}

fn spread_score(short: f64, long: f64, scale: f64) -> Result<f64, ComputeError> {
    if long <= 0.0 {
        return Err(ComputeError::undefined("spread", "non-positive long average"));
    }
    Ok(clamp_unit((short - long) / long / scale))
}

/// Per-indicator weights in the technical average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorWeights {
    pub sma_trend: f64,
    pub ema_crossover: f64,
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub obv_slope: f64,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        Self {
            sma_trend: 0.15,
            ema_crossover: 0.15,
            rsi: 0.20,
            macd: 0.20,
            bollinger: 0.15,
            obv_slope: 0.15,
        }
    }
}

impl IndicatorWeights {
    pub fn weight(&self, indicator: TechnicalIndicator) -> f64 {
        match indicator {
            TechnicalIndicator::SmaTrend => self.sma_trend,
            TechnicalIndicator::EmaCrossover => self.ema_crossover,
            TechnicalIndicator::Rsi => self.rsi,
            TechnicalIndicator::Macd => self.macd,
            TechnicalIndicator::Bollinger => self.bollinger,
            TechnicalIndicator::ObvSlope => self.obv_slope,
        }
    }

    pub fn total(&self) -> f64 {
        TechnicalIndicator::ALL.iter().map(|i| self.weight(*i)).sum()
    }
}

/// Indicator periods, normalization scales and weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalParams {
    pub sma_short: usize,
    pub sma_long: usize,
    /// Relative SMA spread that maps to a full-strength score.
    pub sma_spread_scale: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Relative EMA spread that maps to a full-strength score.
    pub ema_spread_scale: f64,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub obv_window: usize,
    pub weights: IndicatorWeights,
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            sma_short: 20,
            sma_long: 50,
            sma_spread_scale: 0.05,
            ema_fast: 12,
            ema_slow: 26,
            ema_spread_scale: 0.03,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            obv_window: 30,
            weights: IndicatorWeights::default(),
        }
    }
}

impl TechnicalParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        for (field, value) in [
            ("technical.sma_short", self.sma_short),
            ("technical.sma_long", self.sma_long),
            ("technical.ema_fast", self.ema_fast),
            ("technical.ema_slow", self.ema_slow),
            ("technical.rsi_period", self.rsi_period),
            ("technical.macd_fast", self.macd_fast),
            ("technical.macd_slow", self.macd_slow),
            ("technical.macd_signal", self.macd_signal),
            ("technical.bollinger_period", self.bollinger_period),
        ] {
            require_period(field, value)?;
        }
        if self.obv_window < 2 {
            return Err(ParamError::new("technical.obv_window", "must be >= 2"));
        }
        if self.sma_short >= self.sma_long {
            return Err(ParamError::new("technical.sma_short", "must be shorter than sma_long"));
        }
        if self.ema_fast >= self.ema_slow {
            return Err(ParamError::new("technical.ema_fast", "must be shorter than ema_slow"));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ParamError::new("technical.macd_fast", "must be shorter than macd_slow"));
        }
        require_positive("technical.sma_spread_scale", self.sma_spread_scale)?;
        require_positive("technical.ema_spread_scale", self.ema_spread_scale)?;
        require_positive("technical.bollinger_multiplier", self.bollinger_multiplier)?;
        let weights: Vec<f64> = TechnicalIndicator::ALL
            .iter()
            .map(|i| self.weights.weight(*i))
            .collect();
        require_weights("technical.weights", &weights)
    }
}

/// An indicator left out of the technical score, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedIndicator {
    pub indicator: TechnicalIndicator,
    pub reason: ComputeError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAssessment {
    /// Weighted average over the computed indicators; `None` if none computed.
    pub score: Option<f64>,
    pub components: Vec<SignalScore>,
    pub excluded: Vec<ExcludedIndicator>,
    /// Included weight / total configured weight, in [0, 1].
    pub coverage: f64,
}

impl TechnicalAssessment {
    pub fn is_complete(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Score every configured indicator against `bars` and aggregate.
pub fn assess_technical(bars: &[Bar], params: &TechnicalParams) -> TechnicalAssessment {
    let mut components = Vec::new();
    let mut excluded = Vec::new();
    let mut included_weight = 0.0;
    let total = params.weights.total();

    for indicator in TechnicalIndicator::ALL {
        let weight = params.weights.weight(indicator);
        if weight <= 0.0 {
            continue;
        }
        match indicator.score(bars, params) {
            Ok(value) => {
                included_weight += weight;
                components.push(SignalScore::new(indicator.name(), value, weight / total));
            }
            Err(reason) => {
                debug!(indicator = indicator.name(), %reason, "indicator excluded");
                excluded.push(ExcludedIndicator { indicator, reason });
            }
        }
    }

    let coverage = if total > 0.0 { included_weight / total } else { 0.0 };
    TechnicalAssessment {
        score: weighted_average(&components),
        components,
        excluded,
        coverage,
    }
}
