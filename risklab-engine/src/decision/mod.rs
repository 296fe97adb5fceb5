//! Decision pipeline: composite scoring, confidence, gating, and the record
//! that comes out the other end.

pub mod confidence;
pub mod engine;
pub mod record;
pub mod scorer;

pub use confidence::{confidence, risk_coverage, ConfidenceParams, Coverage};
pub use engine::DecisionEngine;
pub use record::{
    Action, DecisionFlag, DecisionInputs, DecisionRecord, DecisionStage, DecisionStatus,
    GateOutcome, StopLossPlan,
};
pub use scorer::{
    risk_penalty, AdditiveScorer, CompositeScorer, DampedScorer, EngineWeights, ScoreInputs,
    ScoringStrategy,
};
