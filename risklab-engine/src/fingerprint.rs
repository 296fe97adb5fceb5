//! Input fingerprinting — deterministic identity of a decision's inputs.
//!
//! Canonical serialization: struct fields in declaration order, maps as
//! `BTreeMap`, streamed as JSON into a blake3 hasher. Identical inputs and
//! configuration always produce the same hex digest.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValidatedConfig;
use crate::decision::DecisionInputs;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash of any serializable value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, value)?;
        Ok(Self(hasher.finalize().to_hex().to_string()))
    }

    /// Hash of configuration and inputs together.
    pub fn of_decision(
        config: &ValidatedConfig,
        inputs: &DecisionInputs,
    ) -> Result<Self, serde_json::Error> {
        Self::of(&(&**config, inputs))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use risklab_core::domain::{FundamentalSnapshot, Ratio};

    fn inputs() -> DecisionInputs {
        DecisionInputs::new("AAPL")
            .with_fundamentals(FundamentalSnapshot::new().with(Ratio::PeRatio, 18.0))
            .with_portfolio_value(100_000.0)
    }

    #[test]
    fn hashing_is_deterministic() {
        let cfg = EngineConfig::default().validate().unwrap();
        let a = Fingerprint::of_decision(&cfg, &inputs()).unwrap();
        let b = Fingerprint::of_decision(&cfg, &inputs()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn any_input_change_changes_hash() {
        let cfg = EngineConfig::default().validate().unwrap();
        let a = Fingerprint::of_decision(&cfg, &inputs()).unwrap();
        let b = Fingerprint::of_decision(&cfg, &inputs().with_portfolio_value(1.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn config_change_changes_hash() {
        let a_cfg = EngineConfig::default().validate().unwrap();
        let b_cfg = EngineConfig {
            min_confidence_threshold: 0.7,
            ..EngineConfig::default()
        }
        .validate()
        .unwrap();
        assert_ne!(
            Fingerprint::of_decision(&a_cfg, &inputs()).unwrap(),
            Fingerprint::of_decision(&b_cfg, &inputs()).unwrap()
        );
    }
}
