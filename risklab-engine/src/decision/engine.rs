//! Decision Engine: inputs → scored → gated → record.
//!
//! `evaluate` is pure apart from the timestamp: it never touches I/O and
//! never fails for valid-but-boring inputs. Missing or partial inputs lower
//! confidence; they do not block the computation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use risklab_core::signals::{assess_fundamentals, assess_technical};
use risklab_core::sizers::{PositionSizeRecommendation, Sizer};

use crate::config::ValidatedConfig;
use crate::decision::confidence::{confidence, risk_coverage, Coverage};
use crate::decision::record::{
    Action, DecisionFlag, DecisionInputs, DecisionRecord, DecisionStage, DecisionStatus,
    GateOutcome, StopLossPlan,
};
use crate::decision::scorer::{risk_penalty, CompositeScorer, ScoreInputs};
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::risk::{RiskInputs, RiskSnapshot};

pub struct DecisionEngine {
    config: ValidatedConfig,
    sizer: Box<dyn Sizer>,
    scorer: &'static dyn CompositeScorer,
}

impl DecisionEngine {
    pub fn new(config: ValidatedConfig) -> Self {
        let sizer = config.sizing.build(
            config.default_position_size_percent,
            config.max_position_size_percent,
        );
        let scorer = config.scoring.scorer();
        Self {
            config,
            sizer,
            scorer,
        }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn fingerprint(&self, inputs: &DecisionInputs) -> Result<Fingerprint, EngineError> {
        Ok(Fingerprint::of_decision(&self.config, inputs)?)
    }

    /// Fingerprint then evaluate, stamped with the current time.
    pub fn evaluate(&self, inputs: &DecisionInputs) -> Result<DecisionRecord, EngineError> {
        let fingerprint = self.fingerprint(inputs)?;
        Ok(self.evaluate_at(inputs, fingerprint, Utc::now()))
    }

    /// Evaluate many symbols in parallel. Each result is identical to what
    /// `evaluate` returns for that input alone.
    pub fn evaluate_batch(
        &self,
        inputs: &[DecisionInputs],
    ) -> Vec<Result<DecisionRecord, EngineError>> {
        inputs.par_iter().map(|i| self.evaluate(i)).collect()
    }

    /// The numeric pipeline. Deterministic given its arguments.
    pub fn evaluate_at(
        &self,
        inputs: &DecisionInputs,
        fingerprint: Fingerprint,
        timestamp: DateTime<Utc>,
    ) -> DecisionRecord {
        let cfg = &self.config;
        let weights = cfg.weights();
        let mut stages = vec![DecisionStage::CollectingInputs];
        let mut flags = BTreeSet::new();

        // ── Collect ──
        let bars = inputs.series.as_ref().map(|s| s.bars()).unwrap_or(&[]);
        let technical = inputs
            .series
            .as_ref()
            .map(|s| assess_technical(s.bars(), &cfg.technical));
        match &technical {
            None => {
                flags.insert(DecisionFlag::MissingPriceData);
            }
            Some(t) if !t.is_complete() => {
                flags.insert(DecisionFlag::PartialTechnical);
            }
            Some(_) => {}
        }

        let fundamental = inputs
            .fundamentals
            .as_ref()
            .map(|f| assess_fundamentals(f, &cfg.fundamental));
        match &fundamental {
            None => {
                flags.insert(DecisionFlag::MissingFundamentals);
            }
            Some(f) if f.low_confidence => {
                flags.insert(DecisionFlag::LowConfidence);
            }
            Some(_) => {}
        }

        let dated_returns = inputs
            .series
            .as_ref()
            .map(|s| s.dated_returns())
            .unwrap_or_default();
        let risk = inputs.series.as_ref().map(|_| {
            let mut universe = Vec::with_capacity(inputs.peers.len() + 1);
            if !inputs.peers.is_empty() {
                universe.push((inputs.symbol.clone(), dated_returns.clone()));
                universe.extend(inputs.peers.iter().cloned());
            }
            let mut risk_inputs = RiskInputs::new(&dated_returns, inputs.position_value.unwrap_or(1.0))
                .with_correlation_universe(&universe);
            if let Some(bench) = &inputs.benchmark {
                risk_inputs = risk_inputs.with_benchmark(bench);
            }
            RiskSnapshot::compute(&risk_inputs, &cfg.risk, cfg.risk_free_rate)
        });
        if !risk.as_ref().is_some_and(|r| r.gaps.is_empty()) {
            flags.insert(DecisionFlag::UndefinedRiskMetric);
        }

        // ── Score ──
        let score_inputs = ScoreInputs {
            technical: technical.as_ref().and_then(|t| t.score),
            fundamental: fundamental.as_ref().and_then(|f| f.score),
            risk_penalty: risk.as_ref().and_then(|r| risk_penalty(r, &cfg.risk)),
        };
        let composite = self.scorer.score(&score_inputs, &weights);
        let coverage = Coverage {
            technical: technical.as_ref().map_or(0.0, |t| t.coverage),
            fundamental: fundamental.as_ref().map_or(0.0, |f| f.coverage),
            risk: risk_coverage(risk.as_ref()),
        };
        let confidence = confidence(composite, &coverage, &weights, &cfg.confidence);
        stages.push(DecisionStage::Scored);

        // ── Gate ──
        let returns: Vec<f64> = dated_returns.iter().map(|(_, r)| *r).collect();
        let sizing = self.sizer.recommend(&returns);
        let (action, gate) = self.gate(composite, confidence, &sizing);
        stages.push(DecisionStage::Gated);
        stages.push(if action.is_directional() {
            DecisionStage::Accepted
        } else {
            DecisionStage::Rejected
        });

        // ── Size ──
        let last_close = inputs.series.as_ref().and_then(|s| s.last_close());
        let size = action.is_directional().then(|| sizing.scaled(confidence));
        let notional = match (&size, inputs.portfolio_value) {
            (Some(s), Some(pv)) if pv > 0.0 => Some(s.fraction * pv),
            _ => None,
        };
        let shares = match (notional, last_close) {
            (Some(n), Some(px)) if px > 0.0 => Some((n / px).floor() as u64),
            _ => None,
        };
        let stop_loss = size
            .as_ref()
            .map(|s| self.stop_loss_plan(action, s, last_close));

        debug!(
            symbol = %inputs.symbol,
            bars = bars.len(),
            composite,
            confidence,
            ?action,
            "decision evaluated"
        );
        if let GateOutcome::BelowConfidence { .. } = gate {
            info!(symbol = %inputs.symbol, confidence, "below confidence threshold, holding");
        }

        DecisionRecord {
            symbol: inputs.symbol.clone(),
            timestamp,
            technical_score: score_inputs.technical,
            fundamental_score: score_inputs.fundamental,
            risk_penalty: score_inputs.risk_penalty,
            risk_adjusted_score: composite,
            confidence,
            action,
            size_recommendation: size,
            notional,
            shares,
            stop_loss,
            rationale: None,
            status: DecisionStatus::Proposed,
            gate,
            flags,
            stages,
            scoring: cfg.scoring,
            technical,
            fundamental,
            risk,
            fingerprint: fingerprint.into(),
        }
    }

    /// Confidence floor first: nothing directional below it.
    ///
    /// Above the floor a positive composite buys and a negative one sells.
    /// A composite of exactly 0 holds with `NoDirection` instead of falling
    /// into the sell branch, and a buy with a negative Kelly edge holds with
    /// `NegativeEdge`.
    fn gate(
        &self,
        composite: f64,
        confidence: f64,
        sizing: &PositionSizeRecommendation,
    ) -> (Action, GateOutcome) {
        let threshold = self.config.min_confidence_threshold;
        if confidence < threshold {
            return (
                Action::Hold,
                GateOutcome::BelowConfidence {
                    confidence,
                    threshold,
                },
            );
        }
        if composite == 0.0 {
            return (Action::Hold, GateOutcome::NoDirection);
        }
        if composite > 0.0 {
            if sizing.has_negative_edge() {
                let raw_kelly = sizing.raw_kelly.unwrap_or(0.0);
                return (Action::Hold, GateOutcome::NegativeEdge { raw_kelly });
            }
            return (Action::Buy, GateOutcome::Passed);
        }
        (Action::Sell, GateOutcome::Passed)
    }

    fn stop_loss_plan(
        &self,
        action: Action,
        size: &PositionSizeRecommendation,
        last_close: Option<f64>,
    ) -> StopLossPlan {
        let stop = self.config.default_stop_loss_percent;
        let stop_price = last_close.map(|px| match action {
            Action::Sell => px * (1.0 + stop),
            _ => px * (1.0 - stop),
        });
        StopLossPlan {
            stop_loss_percent: stop,
            stop_price,
            max_loss_fraction: size.fraction * stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use risklab_core::domain::{Bar, FundamentalSnapshot, PriceSeries, Ratio};
    use risklab_core::sizers::KellyOutcome;

    use crate::config::EngineConfig;

    fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1_000.0))
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    fn strong_fundamentals() -> FundamentalSnapshot {
        FundamentalSnapshot::new()
            .with(Ratio::PeRatio, 10.0)
            .with(Ratio::EarningsGrowth, 0.25)
            .with(Ratio::RevenueGrowth, 0.20)
            .with(Ratio::ProfitMargin, 0.30)
            .with(Ratio::ReturnOnEquity, 0.25)
            .with(Ratio::DebtToEquity, 0.2)
            .with(Ratio::CurrentRatio, 2.5)
    }

    fn weak_fundamentals() -> FundamentalSnapshot {
        FundamentalSnapshot::new()
            .with(Ratio::PeRatio, 40.0)
            .with(Ratio::EarningsGrowth, -0.20)
            .with(Ratio::RevenueGrowth, -0.10)
            .with(Ratio::ProfitMargin, -0.05)
            .with(Ratio::ReturnOnEquity, -0.10)
            .with(Ratio::DebtToEquity, 3.0)
            .with(Ratio::CurrentRatio, 0.5)
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(EngineConfig::default().validate().unwrap())
    }

    fn at(engine: &DecisionEngine, inputs: &DecisionInputs) -> DecisionRecord {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let fp = engine.fingerprint(inputs).unwrap();
        engine.evaluate_at(inputs, fp, ts)
    }

    #[test]
    fn flat_thirty_bars_holds_with_reduced_confidence() {
        let inputs = DecisionInputs::new("FLAT").with_series(series("FLAT", &[100.0; 30]));
        let record = at(&engine(), &inputs);

        assert_eq!(record.technical_score, Some(0.0));
        assert_eq!(record.action, Action::Hold);
        assert!(record.confidence < 0.60);
        assert!(matches!(record.gate, GateOutcome::BelowConfidence { .. }));
        assert!(record.size_recommendation.is_none());
        assert!(record.stop_loss.is_none());
        assert!(record.has_flag(DecisionFlag::PartialTechnical));
        assert!(record.has_flag(DecisionFlag::MissingFundamentals));
        assert_eq!(record.stages.last(), Some(&DecisionStage::Rejected));
    }

    #[test]
    fn strong_fundamentals_on_flat_tape_buy() {
        let inputs = DecisionInputs::new("GOOD")
            .with_series(series("GOOD", &[100.0; 100]))
            .with_fundamentals(strong_fundamentals())
            .with_portfolio_value(100_000.0);
        let record = at(&engine(), &inputs);

        assert_eq!(record.technical_score, Some(0.0));
        assert_eq!(record.fundamental_score, Some(1.0));
        assert_eq!(record.risk_penalty, Some(0.0));
        assert!((record.risk_adjusted_score - 0.3).abs() < 1e-12);
        assert!((record.confidence - 0.875).abs() < 1e-12);
        assert_eq!(record.action, Action::Buy);
        assert_eq!(record.gate, GateOutcome::Passed);

        let size = record.size_recommendation.as_ref().unwrap();
        assert_eq!(size.outcome, KellyOutcome::InsufficientHistory);
        assert!((size.fraction - 0.05 * 0.875).abs() < 1e-12);
        assert!((record.notional.unwrap() - 4_375.0).abs() < 1e-6);
        assert_eq!(record.shares, Some(43));

        let stop = record.stop_loss.as_ref().unwrap();
        assert!((stop.stop_price.unwrap() - 95.0).abs() < 1e-9);
        assert!((stop.max_loss_fraction - size.fraction * 0.05).abs() < 1e-12);
        assert_eq!(record.stages.last(), Some(&DecisionStage::Accepted));
    }

    #[test]
    fn weak_fundamentals_on_flat_tape_sell_with_stop_above() {
        let inputs = DecisionInputs::new("BAD")
            .with_series(series("BAD", &[100.0; 100]))
            .with_fundamentals(weak_fundamentals());
        let record = at(&engine(), &inputs);

        assert_eq!(record.action, Action::Sell);
        assert!(record.risk_adjusted_score < 0.0);
        assert!(record.notional.is_none());
        let stop = record.stop_loss.as_ref().unwrap();
        assert!((stop.stop_price.unwrap() - 105.0).abs() < 1e-9);
    }

    #[test]
    fn negative_edge_blocks_buy() {
        let mut cfg = EngineConfig::default();
        cfg.weight_technical = 0.0;
        cfg.weight_fundamental = 0.8;
        cfg.weight_risk = 0.2;
        let engine = DecisionEngine::new(cfg.validate().unwrap());

        // Alternating +1% / −2%: half the trades win, losses twice as large.
        let mut closes = vec![100.0];
        for i in 0..99 {
            let last = closes[closes.len() - 1];
            closes.push(if i % 2 == 0 { last * 1.01 } else { last * 0.98 });
        }
        let inputs = DecisionInputs::new("BLEED")
            .with_series(series("BLEED", &closes))
            .with_fundamentals(strong_fundamentals());
        let record = at(&engine, &inputs);

        assert!(record.risk_adjusted_score > 0.0);
        assert!(record.confidence >= 0.60);
        assert_eq!(record.action, Action::Hold);
        match record.gate {
            GateOutcome::NegativeEdge { raw_kelly } => assert!(raw_kelly < 0.0),
            other => panic!("expected negative edge, got {other:?}"),
        }
        assert!(record.size_recommendation.is_none());
    }

    #[test]
    fn no_inputs_is_a_hold_not_an_error() {
        let record = at(&engine(), &DecisionInputs::new("NONE"));
        assert_eq!(record.action, Action::Hold);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.technical_score, None);
        assert!(record.has_flag(DecisionFlag::MissingPriceData));
        assert!(record.has_flag(DecisionFlag::MissingFundamentals));
        assert!(record.has_flag(DecisionFlag::UndefinedRiskMetric));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let engine = engine();
        let inputs = DecisionInputs::new("GOOD")
            .with_series(series("GOOD", &[100.0; 60]))
            .with_fundamentals(strong_fundamentals());
        assert_eq!(at(&engine, &inputs), at(&engine, &inputs));
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let engine = engine();
        let inputs = vec![
            DecisionInputs::new("A").with_series(series("A", &[100.0; 40])),
            DecisionInputs::new("B").with_fundamentals(strong_fundamentals()),
        ];
        let batch = engine.evaluate_batch(&inputs);
        assert_eq!(batch.len(), 2);
        for (input, result) in inputs.iter().zip(batch) {
            let mut batched = result.unwrap();
            let single = at(&engine, input);
            batched.timestamp = single.timestamp;
            assert_eq!(batched, single);
        }
    }

    #[test]
    fn zero_composite_holds_rather_than_sells() {
        let engine = engine();
        let sizing = PositionSizeRecommendation {
            fraction: 0.02,
            raw_kelly: None,
            outcome: KellyOutcome::Undefined,
        };
        assert_eq!(engine.gate(0.0, 1.0, &sizing), (Action::Hold, GateOutcome::NoDirection));
        assert_eq!(engine.gate(-1e-9, 1.0, &sizing), (Action::Sell, GateOutcome::Passed));
        assert_eq!(engine.gate(1e-9, 1.0, &sizing), (Action::Buy, GateOutcome::Passed));
    }
}
