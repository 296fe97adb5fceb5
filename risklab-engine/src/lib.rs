//! RiskLab Engine — risk metrics, configuration, and the decision pipeline.
//!
//! Given bars, fundamentals and portfolio context, the engine produces a
//! gated BUY / SELL / HOLD recommendation with confidence and sizing:
//! - `risk` computes VaR, CVaR, Sharpe, Sortino, drawdown, beta, correlation
//! - `decision` fuses signal scores and the risk penalty, then gates
//! - `cache` coalesces concurrent identical requests
//! - `sources` and `rationale` are the collaborator seams
//! - `service` wires collaborators, cache and engine together

pub mod cache;
pub mod config;
pub mod decision;
pub mod error;
pub mod fingerprint;
pub mod rationale;
pub mod risk;
pub mod service;
pub mod sources;

pub use config::{ConfigError, EngineConfig, ValidatedConfig};
pub use decision::{Action, DecisionEngine, DecisionInputs, DecisionRecord};
pub use error::{CollaboratorError, EngineError};
pub use fingerprint::Fingerprint;
pub use service::{DecisionRequest, DecisionService, Holding};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across rayon workers or the
    /// cache's waiters must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<DecisionEngine>();
        require_sync::<DecisionEngine>();
        require_send::<DecisionService>();
        require_sync::<DecisionService>();
        require_send::<DecisionRecord>();
        require_sync::<DecisionRecord>();
        require_send::<cache::DecisionCache>();
        require_sync::<cache::DecisionCache>();
        require_send::<risk::RiskSnapshot>();
        require_sync::<risk::RiskSnapshot>();
        require_send::<ValidatedConfig>();
        require_sync::<ValidatedConfig>();
    }

    #[test]
    fn default_config_builds_an_engine() {
        let engine = DecisionEngine::new(EngineConfig::default().validate().unwrap());
        assert_eq!(engine.config().min_confidence_threshold, 0.60);
    }
}
