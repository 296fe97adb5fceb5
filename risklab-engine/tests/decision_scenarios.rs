//! End-to-end decision scenarios through the public API.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use risklab_core::domain::{Bar, DatedReturns, FundamentalSnapshot, PriceSeries, Ratio};
use risklab_engine::decision::{Action, DecisionFlag, GateOutcome};
use risklab_engine::risk::{RiskInputs, RiskParams, RiskSnapshot};
use risklab_engine::{DecisionEngine, DecisionInputs, DecisionRecord, EngineConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn series(symbol: &str, closes: &[f64], volume: f64) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(start() + Duration::days(i as i64), c, c, c, c, volume))
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

/// Gentle uptrend with a repeating wobble so no metric is degenerate.
fn wavy_closes(n: usize) -> Vec<f64> {
    let wobble = [0.012, -0.008, 0.005, -0.011, 0.009, -0.004, 0.007];
    let mut price = 50.0;
    (0..n)
        .map(|i| {
            price *= 1.0 + wobble[i % wobble.len()];
            price
        })
        .collect()
}

fn default_engine() -> DecisionEngine {
    DecisionEngine::new(EngineConfig::default().validate().unwrap())
}

fn frozen(engine: &DecisionEngine, inputs: &DecisionInputs) -> DecisionRecord {
    let mut record = engine.evaluate(inputs).unwrap();
    record.timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    record.rationale = None;
    record
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn thirty_flat_days_hold_with_zero_technical_score() {
    let inputs = DecisionInputs::new("FLAT").with_series(series("FLAT", &[42.0; 30], 10_000.0));
    let record = default_engine().evaluate(&inputs).unwrap();

    assert_eq!(record.technical_score, Some(0.0));
    assert_eq!(record.action, Action::Hold);
    assert!(record.confidence < 0.60, "confidence {}", record.confidence);

    let technical = record.technical.as_ref().unwrap();
    assert!(technical.coverage < 1.0);
    let excluded: Vec<&str> = technical.excluded.iter().map(|e| e.indicator.name()).collect();
    assert!(excluded.contains(&"macd"));
    assert!(excluded.contains(&"obv_slope"));
    assert!(record.has_flag(DecisionFlag::PartialTechnical));
}

#[test]
fn known_sharpe_is_reproduced_after_annualization() {
    // Alternating mu ± d: mean mu, sample std d·sqrt(n/(n−1)).
    let n = 252usize;
    let d = 0.01;
    let target = 1.2;
    let mu = target * d * (n as f64 / (n as f64 - 1.0)).sqrt() / 252f64.sqrt();
    let returns: DatedReturns = (0..n)
        .map(|i| {
            let r = if i % 2 == 0 { mu + d } else { mu - d };
            (start() + Duration::days(i as i64), r)
        })
        .collect();

    let params = RiskParams::default();
    let snapshot = RiskSnapshot::compute(&RiskInputs::new(&returns, 1.0), &params, 0.0);
    let sharpe = snapshot.sharpe.unwrap();
    assert!((sharpe - target).abs() < 1e-6, "sharpe {sharpe}");
}

#[test]
fn identical_frozen_inputs_give_bit_identical_records() {
    let engine = default_engine();
    let inputs = DecisionInputs::new("WAVY")
        .with_series(series("WAVY", &wavy_closes(300), 25_000.0))
        .with_fundamentals(
            FundamentalSnapshot::new()
                .with(Ratio::PeRatio, 18.0)
                .with(Ratio::SectorPeMedian, 21.0)
                .with(Ratio::ReturnOnEquity, 0.12),
        )
        .with_portfolio_value(250_000.0);

    let a = frozen(&engine, &inputs);
    let b = frozen(&engine, &inputs);
    let a_json = serde_json::to_string(&a).unwrap();
    let b_json = serde_json::to_string(&b).unwrap();
    assert_eq!(a_json, b_json);
    assert_eq!(a.risk_adjusted_score.to_bits(), b.risk_adjusted_score.to_bits());
    assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());

    let back: DecisionRecord = serde_json::from_str(&a_json).unwrap();
    assert_eq!(back, a);
}

#[test]
fn fingerprint_tracks_inputs_and_config() {
    let engine = default_engine();
    let base = DecisionInputs::new("WAVY").with_series(series("WAVY", &wavy_closes(80), 1.0));
    let same = base.clone();
    let other = base.clone().with_portfolio_value(1_000.0);

    let fp = engine.fingerprint(&base).unwrap();
    assert_eq!(fp, engine.fingerprint(&same).unwrap());
    assert_ne!(fp, engine.fingerprint(&other).unwrap());

    let mut cfg = EngineConfig::default();
    cfg.min_confidence_threshold = 0.7;
    let stricter = DecisionEngine::new(cfg.validate().unwrap());
    assert_ne!(fp, stricter.fingerprint(&base).unwrap());
}

#[test]
fn zero_volume_series_is_scored_not_rejected() {
    let inputs = DecisionInputs::new("ZV").with_series(series("ZV", &wavy_closes(120), 0.0));
    let record = default_engine().evaluate(&inputs).unwrap();
    let technical = record.technical.as_ref().unwrap();
    assert!(technical.score.is_some());
    assert!(technical.excluded.is_empty());
}

#[test]
fn damped_scoring_never_flips_direction() {
    let mut cfg = EngineConfig::default();
    cfg.scoring = risklab_engine::decision::ScoringStrategy::Damped;
    let damped = DecisionEngine::new(cfg.validate().unwrap());
    let additive = default_engine();

    let inputs = DecisionInputs::new("WAVY")
        .with_series(series("WAVY", &wavy_closes(260), 5_000.0))
        .with_fundamentals(FundamentalSnapshot::new().with(Ratio::DebtToEquity, 2.5));
    let a = additive.evaluate(&inputs).unwrap();
    let d = damped.evaluate(&inputs).unwrap();
    let directional = a.risk_adjusted_score + 0.2 * a.risk_penalty.unwrap_or(0.0);
    assert!(d.risk_adjusted_score.abs() <= directional.abs() + 1e-12);
    if directional != 0.0 {
        assert!(d.risk_adjusted_score == 0.0 || d.risk_adjusted_score.signum() == directional.signum());
    }
}

#[test]
fn hold_records_carry_no_size() {
    let mut cfg = EngineConfig::default();
    cfg.min_confidence_threshold = 1.0;
    let engine = DecisionEngine::new(cfg.validate().unwrap());
    let inputs = DecisionInputs::new("WAVY").with_series(series("WAVY", &wavy_closes(260), 5_000.0));
    let record = engine.evaluate(&inputs).unwrap();
    assert_eq!(record.action, Action::Hold);
    assert!(matches!(record.gate, GateOutcome::BelowConfidence { .. }));
    assert!(record.size_recommendation.is_none());
    assert!(record.notional.is_none());
}
