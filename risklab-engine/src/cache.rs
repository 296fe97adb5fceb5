//! Single-flight decision cache.
//!
//! Keyed by (symbol, inputs fingerprint) with a TTL. Concurrent requests for
//! the same key coalesce: one caller computes, the rest block on the same
//! slot and receive the same `Arc`. A slot only becomes visible as a result
//! once its computation has finished; a computation that panics leaves the
//! slot empty and the next caller computes afresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use risklab_core::ParamError;

use crate::decision::DecisionRecord;

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.enabled && self.ttl_secs == 0 {
            return Err(ParamError::new("cache.ttl_secs", "must be > 0 when the cache is enabled"));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

#[derive(Default)]
struct Slot {
    cell: OnceLock<(Arc<DecisionRecord>, Instant)>,
}

impl Slot {
    /// In-flight slots never expire; waiters must join them.
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cell
            .get()
            .is_some_and(|(_, done)| done.elapsed() >= ttl)
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub computations: u64,
}

pub struct DecisionCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
    hits: AtomicU64,
    computations: AtomicU64,
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.ttl()))
    }

    /// Return the cached record for `key`, or run `compute` exactly once
    /// across all concurrent callers for that key.
    ///
    /// Every miss also drops completed slots older than the TTL, so the map
    /// stays bounded by the keys seen within one TTL window.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Arc<DecisionRecord>
    where
        F: FnOnce() -> DecisionRecord,
    {
        let slot = {
            let ttl = self.ttl;
            let mut slots = self.lock();
            let live = slots.get(key).filter(|s| !s.is_expired(ttl)).cloned();
            match live {
                Some(slot) => slot,
                None => {
                    slots.retain(|_, slot| !slot.is_expired(ttl));
                    let slot = Arc::new(Slot::default());
                    slots.insert(key.clone(), Arc::clone(&slot));
                    slot
                }
            }
        };

        let mut computed = false;
        let (record, _) = slot.cell.get_or_init(|| {
            computed = true;
            self.computations.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %key.symbol, fingerprint = %key.fingerprint, "decision cache miss");
            (Arc::new(compute()), Instant::now())
        });
        if !computed {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Arc::clone(record)
    }

    /// Completed, unexpired record for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DecisionRecord>> {
        let slots = self.lock();
        let slot = slots.get(key)?;
        if slot.is_expired(self.ttl) {
            return None;
        }
        slot.cell.get().map(|(record, _)| Arc::clone(record))
    }

    /// Drop every entry for `symbol`.
    pub fn invalidate(&self, symbol: &str) {
        self.lock().retain(|k, _| k.symbol != symbol);
    }

    /// Drop completed entries older than the TTL.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.lock().retain(|_, slot| !slot.is_expired(ttl));
    }

    /// Number of completed, unexpired entries.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|s| s.cell.get().is_some() && !s.is_expired(self.ttl))
            .count()
    }

    /// Slots in the map, expired or in flight included.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }

    /// The map is never held across a computation, so a poisoned lock still
    /// guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for DecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn dummy_record(symbol: &str) -> DecisionRecord {
    use crate::decision::{Action, DecisionStatus, GateOutcome, ScoringStrategy};
    DecisionRecord {
        symbol: symbol.to_string(),
        timestamp: chrono::Utc::now(),
        technical_score: None,
        fundamental_score: None,
        risk_penalty: None,
        risk_adjusted_score: 0.0,
        confidence: 0.0,
        action: Action::Hold,
        size_recommendation: None,
        notional: None,
        shares: None,
        stop_loss: None,
        rationale: None,
        status: DecisionStatus::Proposed,
        gate: GateOutcome::NoDirection,
        flags: Default::default(),
        stages: Vec::new(),
        scoring: ScoringStrategy::Additive,
        technical: None,
        fundamental: None,
        risk: None,
        fingerprint: String::new(),
    }
}
