//! FundamentalSnapshot — ratio name to value, with absence meaning "unknown".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ratios the fundamental scorer knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ratio {
    PeRatio,
    SectorPeMedian,
    EarningsGrowth,
    RevenueGrowth,
    ProfitMargin,
    ReturnOnEquity,
    DebtToEquity,
    CurrentRatio,
}

impl Ratio {
    pub const ALL: [Ratio; 8] = [
        Ratio::PeRatio,
        Ratio::SectorPeMedian,
        Ratio::EarningsGrowth,
        Ratio::RevenueGrowth,
        Ratio::ProfitMargin,
        Ratio::ReturnOnEquity,
        Ratio::DebtToEquity,
        Ratio::CurrentRatio,
    ];

    /// Map key used in snapshots and config files.
    pub fn key(&self) -> &'static str {
        match self {
            Self::PeRatio => "pe_ratio",
            Self::SectorPeMedian => "sector_pe_median",
            Self::EarningsGrowth => "earnings_growth",
            Self::RevenueGrowth => "revenue_growth",
            Self::ProfitMargin => "profit_margin",
            Self::ReturnOnEquity => "roe",
            Self::DebtToEquity => "debt_to_equity",
            Self::CurrentRatio => "current_ratio",
        }
    }
}

/// Fundamental ratios for one symbol. Missing keys are absent, not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundamentalSnapshot {
    ratios: BTreeMap<String, f64>,
}

impl FundamentalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(ratios: BTreeMap<String, f64>) -> Self {
        Self { ratios }
    }

    /// Builder-style insert.
    pub fn with(mut self, ratio: Ratio, value: f64) -> Self {
        self.ratios.insert(ratio.key().to_string(), value);
        self
    }

    /// The ratio's value, or `None` when absent or non-finite.
    pub fn get(&self, ratio: Ratio) -> Option<f64> {
        self.get_raw(ratio.key())
    }

    pub fn get_raw(&self, key: &str) -> Option<f64> {
        self.ratios.get(key).copied().filter(|v| v.is_finite())
    }

    /// Number of finite ratios present (known or not).
    pub fn len(&self) -> usize {
        self.ratios.values().filter(|v| v.is_finite()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ratios.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_nan_are_none() {
        let snap = FundamentalSnapshot::new()
            .with(Ratio::PeRatio, 12.0)
            .with(Ratio::ProfitMargin, f64::NAN);
        assert_eq!(snap.get(Ratio::PeRatio), Some(12.0));
        assert_eq!(snap.get(Ratio::ProfitMargin), None);
        assert_eq!(snap.get(Ratio::CurrentRatio), None);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn zero_is_a_value_not_absence() {
        let snap = FundamentalSnapshot::new().with(Ratio::DebtToEquity, 0.0);
        assert_eq!(snap.get(Ratio::DebtToEquity), Some(0.0));
    }

    #[test]
    fn deserializes_from_plain_map() {
        let snap: FundamentalSnapshot =
            serde_json::from_str(r#"{"pe_ratio": 18.5, "roe": 0.2}"#).unwrap();
        assert_eq!(snap.get(Ratio::ReturnOnEquity), Some(0.2));
        assert_eq!(snap.get(Ratio::PeRatio), Some(18.5));
    }
}
