//! DecisionService: collaborators → inputs → engine (through the cache) →
//! rationale → sink.
//!
//! Collaborator failures never fail a decision. Missing bars or fundamentals
//! leave the corresponding input empty, which the engine turns into lower
//! confidence. A failed rationale leaves the text empty and flags the record.
//! A failed sink write is logged and the record is still returned.

use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use risklab_core::domain::DatedReturns;
use risklab_core::signals::TechnicalIndicator;

use crate::cache::{CacheKey, CacheStats, DecisionCache};
use crate::decision::{DecisionEngine, DecisionInputs, DecisionRecord};
use crate::error::EngineError;
use crate::rationale::{RationaleProvider, RationaleRequest, TimeoutRationale};
use crate::risk::{portfolio_returns, PositionReturns, RiskInputs, RiskSnapshot};
use crate::sources::{DecisionSink, FundamentalSource, MarketDataSource};

/// One symbol to decide on, plus portfolio context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionRequest {
    pub symbol: String,
    pub portfolio_value: Option<f64>,
    pub position_value: Option<f64>,
    /// Symbols to report correlation against.
    pub peers: Vec<String>,
}

impl DecisionRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_portfolio_value(mut self, value: f64) -> Self {
        self.portfolio_value = Some(value);
        self
    }

    pub fn with_position_value(mut self, value: f64) -> Self {
        self.position_value = Some(value);
        self
    }

    pub fn with_peer(mut self, symbol: impl Into<String>) -> Self {
        self.peers.push(symbol.into());
        self
    }
}

/// One open position in a portfolio risk request.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    /// Current market value.
    pub value: f64,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            value,
        }
    }
}

pub struct DecisionService {
    engine: Arc<DecisionEngine>,
    market: Arc<dyn MarketDataSource>,
    fundamentals: Option<Arc<dyn FundamentalSource>>,
    sink: Option<Arc<dyn DecisionSink>>,
    rationale: Option<Arc<dyn RationaleProvider>>,
    cache: Option<DecisionCache>,
    benchmark: Option<String>,
}

impl DecisionService {
    /// Service with the cache configured by `[cache]` and no optional
    /// collaborators.
    pub fn new(engine: DecisionEngine, market: Arc<dyn MarketDataSource>) -> Self {
        let cache = DecisionCache::from_config(&engine.config().cache);
        Self {
            engine: Arc::new(engine),
            market,
            fundamentals: None,
            sink: None,
            rationale: None,
            cache,
            benchmark: None,
        }
    }

    pub fn with_fundamentals(mut self, source: Arc<dyn FundamentalSource>) -> Self {
        self.fundamentals = Some(source);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach a rationale provider, bounded by `[ai].timeout_ms`.
    pub fn with_rationale(mut self, provider: Arc<dyn RationaleProvider>) -> Self {
        let timeout = self.engine.config().ai.timeout();
        self.rationale = Some(Arc::new(TimeoutRationale::new(provider, timeout)));
        self
    }

    /// Symbol whose returns serve as the beta benchmark.
    pub fn with_benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(DecisionCache::stats)
    }

    /// Bars requested from the market source: the risk lookback in returns,
    /// or the longest indicator warmup, whichever is larger.
    pub fn bar_lookback(&self) -> usize {
        let cfg = self.engine.config();
        let warmup = TechnicalIndicator::ALL
            .iter()
            .map(|i| i.min_bars(&cfg.technical))
            .max()
            .unwrap_or(0);
        (cfg.risk.lookback + 1).max(warmup)
    }

    /// Fetch everything the engine needs for `request`, degrading on failure.
    pub fn gather_inputs(&self, request: &DecisionRequest) -> DecisionInputs {
        let lookback = self.bar_lookback();
        let mut inputs = DecisionInputs::new(request.symbol.clone());

        match self.market.price_series(&request.symbol, lookback) {
            Ok(series) if !series.is_empty() => inputs = inputs.with_series(series),
            Ok(_) => warn!(symbol = %request.symbol, "market data returned no bars"),
            Err(e) => warn!(symbol = %request.symbol, error = %e, "market data unavailable"),
        }

        if let Some(source) = &self.fundamentals {
            match source.fundamentals(&request.symbol) {
                Ok(snapshot) => inputs = inputs.with_fundamentals(snapshot),
                Err(e) => warn!(symbol = %request.symbol, error = %e, "fundamentals unavailable"),
            }
        }

        if let Some(bench) = &self.benchmark {
            if let Some(returns) = self.returns_for(bench, lookback) {
                inputs = inputs.with_benchmark(returns);
            }
        }
        for peer in request.peers.iter().filter(|p| **p != request.symbol) {
            if let Some(returns) = self.returns_for(peer, lookback) {
                inputs = inputs.with_peer(peer.clone(), returns);
            }
        }

        if let Some(v) = request.portfolio_value {
            inputs = inputs.with_portfolio_value(v);
        }
        if let Some(v) = request.position_value {
            inputs = inputs.with_position_value(v);
        }
        inputs
    }

    fn returns_for(&self, symbol: &str, lookback: usize) -> Option<DatedReturns> {
        match self.market.price_series(symbol, lookback) {
            Ok(series) => Some(series.dated_returns()),
            Err(e) => {
                warn!(symbol, error = %e, "reference series unavailable");
                None
            }
        }
    }

    /// RiskSnapshot for a whole portfolio.
    ///
    /// Positions are weighted by market value on the dates they all share;
    /// VaR amounts scale by the total value of the positions that had data.
    /// A position without bars or with a non-positive value is left out and
    /// logged. With two or more positions they also form the correlation
    /// universe.
    pub fn portfolio_risk(&self, holdings: &[Holding]) -> RiskSnapshot {
        let cfg = self.engine.config();
        let lookback = cfg.risk.lookback + 1;

        let mut positions = Vec::with_capacity(holdings.len());
        for holding in holdings {
            if !(holding.value.is_finite() && holding.value > 0.0) {
                warn!(symbol = %holding.symbol, value = holding.value, "position skipped: no exposure");
                continue;
            }
            if let Some(returns) = self.returns_for(&holding.symbol, lookback) {
                positions.push(PositionReturns {
                    symbol: holding.symbol.clone(),
                    exposure: holding.value,
                    returns,
                });
            }
        }

        let exposure: f64 = positions.iter().map(|p| p.exposure).sum();
        let returns = portfolio_returns(&positions);
        let universe: Vec<(String, DatedReturns)> = if positions.len() > 1 {
            positions
                .iter()
                .map(|p| (p.symbol.clone(), p.returns.clone()))
                .collect()
        } else {
            Vec::new()
        };
        let benchmark = self
            .benchmark
            .as_deref()
            .and_then(|symbol| self.returns_for(symbol, lookback));

        let mut inputs = RiskInputs::new(&returns, exposure).with_correlation_universe(&universe);
        if let Some(bench) = &benchmark {
            inputs = inputs.with_benchmark(bench);
        }
        let snapshot = RiskSnapshot::compute(&inputs, &cfg.risk, cfg.risk_free_rate);
        info!(
            positions = positions.len(),
            exposure,
            observations = snapshot.observations,
            risk_level = ?snapshot.risk_level,
            "portfolio risk"
        );
        snapshot
    }

    /// Full decision for one symbol.
    pub fn decide(&self, request: &DecisionRequest) -> Result<DecisionRecord, EngineError> {
        let inputs = self.gather_inputs(request);
        self.decide_inputs(&inputs)
    }

    /// Decision for already-gathered inputs.
    pub fn decide_inputs(&self, inputs: &DecisionInputs) -> Result<DecisionRecord, EngineError> {
        let fingerprint = self.engine.fingerprint(inputs)?;
        let record = match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(inputs.symbol.clone(), fingerprint.as_str());
                let shared = cache.get_or_compute(&key, || {
                    self.engine.evaluate_at(inputs, fingerprint.clone(), Utc::now())
                });
                DecisionRecord::clone(&shared)
            }
            None => self.engine.evaluate_at(inputs, fingerprint, Utc::now()),
        };

        let record = self.attach_rationale(record);
        info!(
            symbol = %record.symbol,
            action = ?record.action,
            score = record.risk_adjusted_score,
            confidence = record.confidence,
            "decision"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.store(&record) {
                warn!(symbol = %record.symbol, sink = sink.name(), error = %e, "failed to store decision");
            }
        }
        Ok(record)
    }

    /// Decisions for many symbols in parallel.
    pub fn decide_batch(
        &self,
        requests: &[DecisionRequest],
    ) -> Vec<Result<DecisionRecord, EngineError>> {
        requests.par_iter().map(|r| self.decide(r)).collect()
    }

    fn attach_rationale(&self, record: DecisionRecord) -> DecisionRecord {
        let Some(provider) = &self.rationale else {
            return record;
        };
        match provider.rationale(&RationaleRequest::from_record(&record)) {
            Ok(text) => record.with_rationale(Some(text)),
            Err(e) => {
                warn!(symbol = %record.symbol, error = %e, "rationale unavailable");
                record.with_rationale(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use chrono::NaiveDate;
    use risklab_core::domain::{Bar, PriceSeries};

    use crate::config::EngineConfig;
    use crate::decision::DecisionFlag;
    use crate::error::CollaboratorError;
    use crate::rationale::StaticRationale;
    use crate::sources::MemorySink;

    struct MapSource {
        series: HashMap<String, PriceSeries>,
        calls: AtomicUsize,
    }

    impl MapSource {
        fn new(entries: &[(&str, usize)]) -> Self {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let series = entries
                .iter()
                .map(|(sym, n)| {
                    let bars = (0..*n)
                        .map(|i| {
                            let c = 100.0 + (i % 5) as f64;
                            Bar::new(start + chrono::Duration::days(i as i64), c, c, c, c, 500.0)
                        })
                        .collect();
                    (sym.to_string(), PriceSeries::new(*sym, bars).unwrap())
                })
                .collect();
            Self {
                series,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MarketDataSource for MapSource {
        fn name(&self) -> &str {
            "map"
        }

        fn price_series(&self, symbol: &str, lookback: usize) -> Result<PriceSeries, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.series
                .get(symbol)
                .map(|s| s.tail(lookback))
                .ok_or_else(|| CollaboratorError::NotFound { what: symbol.into() })
        }
    }

    struct FailingSink;

    impl DecisionSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn store(&self, _record: &DecisionRecord) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::unavailable("failing", "disk full"))
        }
    }

    struct SlowRationale(Duration);

    impl RationaleProvider for SlowRationale {
        fn name(&self) -> &str {
            "slow"
        }

        fn rationale(&self, _request: &RationaleRequest) -> Result<String, CollaboratorError> {
            thread::sleep(self.0);
            Ok("late".into())
        }
    }

    fn engine_with(mutate: impl FnOnce(&mut EngineConfig)) -> DecisionEngine {
        let mut cfg = EngineConfig::default();
        mutate(&mut cfg);
        DecisionEngine::new(cfg.validate().unwrap())
    }

    #[test]
    fn missing_market_data_degrades_to_hold() {
        let service = DecisionService::new(engine_with(|_| {}), Arc::new(MapSource::new(&[])));
        let record = service.decide(&DecisionRequest::new("GHOST")).unwrap();
        assert!(record.has_flag(DecisionFlag::MissingPriceData));
        assert_eq!(record.confidence, 0.0);
    }

    #[test]
    fn sink_receives_record_and_sink_failure_is_not_fatal() {
        let market = Arc::new(MapSource::new(&[("A", 80)]));
        let memory = Arc::new(MemorySink::new());
        let service = DecisionService::new(engine_with(|_| {}), market.clone())
            .with_sink(memory.clone());
        let record = service.decide(&DecisionRequest::new("A")).unwrap();
        assert_eq!(memory.records(), vec![record]);

        let failing = DecisionService::new(engine_with(|_| {}), market).with_sink(Arc::new(FailingSink));
        assert!(failing.decide(&DecisionRequest::new("A")).is_ok());
    }

    #[test]
    fn concurrent_identical_requests_compute_once() {
        let service = Arc::new(DecisionService::new(
            engine_with(|_| {}),
            Arc::new(MapSource::new(&[("A", 120)])),
        ));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.decide(&DecisionRequest::new("A")).unwrap()
                })
            })
            .collect();
        let records: Vec<DecisionRecord> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let stats = service.cache_stats().unwrap();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.hits, 7);
        assert!(records.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn rationale_attached_without_touching_numbers() {
        let market = Arc::new(MapSource::new(&[("A", 80)]));
        let plain = DecisionService::new(engine_with(|_| {}), market.clone()).without_cache();
        let with_text = DecisionService::new(engine_with(|_| {}), market)
            .without_cache()
            .with_rationale(Arc::new(StaticRationale("steady".into())));

        let a = plain.decide(&DecisionRequest::new("A")).unwrap();
        let b = with_text.decide(&DecisionRequest::new("A")).unwrap();
        assert_eq!(b.rationale.as_deref(), Some("steady"));
        assert!(!b.has_flag(DecisionFlag::AiUnavailable));
        assert_eq!(a.action, b.action);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.risk_adjusted_score, b.risk_adjusted_score);
        assert_eq!(a.size_recommendation, b.size_recommendation);
    }

    #[test]
    fn rationale_timeout_flags_ai_unavailable() {
        let market = Arc::new(MapSource::new(&[("A", 80)]));
        let plain = DecisionService::new(engine_with(|_| {}), market.clone()).without_cache();
        let slow = DecisionService::new(engine_with(|c| c.ai.timeout_ms = 20), market)
            .without_cache()
            .with_rationale(Arc::new(SlowRationale(Duration::from_millis(500))));

        let a = plain.decide(&DecisionRequest::new("A")).unwrap();
        let b = slow.decide(&DecisionRequest::new("A")).unwrap();
        assert_eq!(b.rationale, None);
        assert!(b.has_flag(DecisionFlag::AiUnavailable));
        assert_eq!(a.action, b.action);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.size_recommendation, b.size_recommendation);
    }

    #[test]
    fn peers_and_benchmark_are_fetched() {
        let market = Arc::new(MapSource::new(&[("A", 80), ("B", 80), ("SPY", 80)]));
        let service = DecisionService::new(engine_with(|_| {}), market.clone()).with_benchmark("SPY");
        let inputs = service.gather_inputs(&DecisionRequest::new("A").with_peer("B").with_peer("A"));
        assert!(inputs.benchmark.is_some());
        assert_eq!(inputs.peers.len(), 1);
        assert_eq!(market.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn portfolio_risk_weights_positions_by_value() {
        let market = Arc::new(MapSource::new(&[("A", 80), ("B", 60)]));
        let service = DecisionService::new(engine_with(|_| {}), market.clone());
        let snap = service.portfolio_risk(&[
            Holding::new("A", 3000.0),
            Holding::new("B", 1000.0),
            Holding::new("GHOST", 500.0),
            Holding::new("IDLE", 0.0),
        ]);

        // GHOST has no bars and IDLE no value; B bounds the common dates.
        assert_eq!(snap.exposure, 4000.0);
        assert_eq!(snap.observations, 59);
        assert!(snap.var_95.is_some());
        assert!(snap.risk_level.is_some());
        assert_eq!(snap.correlation.as_ref().unwrap().len(), 2);

        let positions = vec![
            PositionReturns {
                symbol: "A".into(),
                exposure: 3000.0,
                returns: market.series["A"].dated_returns(),
            },
            PositionReturns {
                symbol: "B".into(),
                exposure: 1000.0,
                returns: market.series["B"].dated_returns(),
            },
        ];
        let returns = portfolio_returns(&positions);
        let cfg = service.engine().config();
        let direct = RiskSnapshot::compute(&RiskInputs::new(&returns, 4000.0), &cfg.risk, cfg.risk_free_rate);
        assert_eq!(snap.var_95, direct.var_95);
        assert_eq!(snap.volatility, direct.volatility);
    }

    #[test]
    fn empty_portfolio_has_undefined_metrics() {
        let service = DecisionService::new(engine_with(|_| {}), Arc::new(MapSource::new(&[])));
        let snap = service.portfolio_risk(&[Holding::new("GHOST", 1000.0)]);
        assert_eq!(snap.observations, 0);
        assert_eq!(snap.exposure, 0.0);
        assert!(snap.is_undefined("var_95"));
        assert_eq!(snap.risk_level, None);
    }

    #[test]
    fn batch_decides_every_symbol() {
        let market = Arc::new(MapSource::new(&[("A", 80), ("B", 40)]));
        let service = DecisionService::new(engine_with(|_| {}), market);
        let results = service.decide_batch(&[DecisionRequest::new("A"), DecisionRequest::new("B")]);
        let symbols: Vec<String> = results.into_iter().map(|r| r.unwrap().symbol).collect();
        assert_eq!(symbols, vec!["A", "B"]);
    }
}
