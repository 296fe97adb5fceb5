//! Portfolio-level return series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use risklab_core::domain::DatedReturns;

/// One holding: its dated returns and current market value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReturns {
    pub symbol: String,
    pub exposure: f64,
    pub returns: DatedReturns,
}

/// Exposure-weighted portfolio returns on the dates every position shares.
///
/// Weights are `exposure / Σ exposure`. Positions with non-positive exposure
/// are skipped. Empty when nothing is held or no date is common to all.
pub fn portfolio_returns(positions: &[PositionReturns]) -> DatedReturns {
    let held: Vec<&PositionReturns> = positions.iter().filter(|p| p.exposure > 0.0).collect();
    let total: f64 = held.iter().map(|p| p.exposure).sum();
    if held.is_empty() || total <= 0.0 {
        return Vec::new();
    }

    let mut by_date: BTreeMap<chrono::NaiveDate, (usize, f64)> = BTreeMap::new();
    for p in &held {
        let weight = p.exposure / total;
        for (date, r) in &p.returns {
            let entry = by_date.entry(*date).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += weight * r;
        }
    }
    by_date
        .into_iter()
        .filter(|(_, (count, _))| *count == held.len())
        .map(|(date, (_, r))| (date, r))
        .collect()
}
