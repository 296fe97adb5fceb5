//! Engine configuration.
//!
//! Loaded from TOML with every field defaulted, then overridden by
//! `RISKLAB_<KEY>` environment variables for the top-level scalars, then
//! validated exactly once into a [`ValidatedConfig`]. The decision engine only
//! accepts a `ValidatedConfig`, so no computation ever sees invalid weights.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use risklab_core::signals::{FundamentalParams, TechnicalParams};
use risklab_core::sizers::SizingParams;
use risklab_core::ParamError;

use crate::cache::CacheConfig;
use crate::decision::{ConfidenceParams, EngineWeights, ScoringStrategy};
use crate::rationale::AiConfig;
use crate::risk::RiskParams;

/// Tolerance on the engine weights summing to 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RISKLAB_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl From<ParamError> for ConfigError {
    fn from(e: ParamError) -> Self {
        Self::Invalid {
            field: e.field,
            reason: e.reason,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_position_size_percent: f64,
    pub max_position_size_percent: f64,
    pub default_stop_loss_percent: f64,
    pub min_confidence_threshold: f64,
    pub weight_technical: f64,
    pub weight_fundamental: f64,
    pub weight_risk: f64,
    /// Annual rate; Sharpe/Sortino subtract `rate / 252` per day.
    pub risk_free_rate: f64,
    pub scoring: ScoringStrategy,
    pub technical: TechnicalParams,
    pub fundamental: FundamentalParams,
    pub risk: RiskParams,
    pub confidence: ConfidenceParams,
    pub sizing: SizingParams,
    pub ai: AiConfig,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_position_size_percent: 0.05,
            max_position_size_percent: 0.20,
            default_stop_loss_percent: 0.05,
            min_confidence_threshold: 0.60,
            weight_technical: 0.5,
            weight_fundamental: 0.3,
            weight_risk: 0.2,
            risk_free_rate: 0.04,
            scoring: ScoringStrategy::Additive,
            technical: TechnicalParams::default(),
            fundamental: FundamentalParams::default(),
            risk: RiskParams::default(),
            confidence: ConfidenceParams::default(),
            sizing: SizingParams::default(),
            ai: AiConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// File (or defaults), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<ValidatedConfig, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()
    }

    pub fn weights(&self) -> EngineWeights {
        EngineWeights {
            technical: self.weight_technical,
            fundamental: self.weight_fundamental,
            risk: self.weight_risk,
        }
    }

    /// Apply `RISKLAB_<KEY>` overrides for the top-level scalar keys.
    ///
    /// `lookup` abstracts the environment so tests need not mutate it.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scalars: [(&str, &mut f64); 8] = [
            ("DEFAULT_POSITION_SIZE_PERCENT", &mut self.default_position_size_percent),
            ("MAX_POSITION_SIZE_PERCENT", &mut self.max_position_size_percent),
            ("DEFAULT_STOP_LOSS_PERCENT", &mut self.default_stop_loss_percent),
            ("MIN_CONFIDENCE_THRESHOLD", &mut self.min_confidence_threshold),
            ("WEIGHT_TECHNICAL", &mut self.weight_technical),
            ("WEIGHT_FUNDAMENTAL", &mut self.weight_fundamental),
            ("WEIGHT_RISK", &mut self.weight_risk),
            ("RISK_FREE_RATE", &mut self.risk_free_rate),
        ];
        for (name, slot) in scalars {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&key) {
                *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: key.clone(),
                    value: raw.clone(),
                })?;
                debug!(%key, value = *slot, "config override from environment");
            }
        }

        let key = format!("{ENV_PREFIX}SCORING");
        if let Some(raw) = lookup(&key) {
            self.scoring = match raw.trim().to_ascii_lowercase().as_str() {
                "additive" => ScoringStrategy::Additive,
                "damped" => ScoringStrategy::Damped,
                _ => return Err(ConfigError::InvalidEnv { key, value: raw }),
            };
        }
        Ok(())
    }

    /// Check every rule once and seal the result.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let w = self.weights();
        for (field, v) in [
            ("weight_technical", w.technical),
            ("weight_fundamental", w.fundamental),
            ("weight_risk", w.risk),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(field, format!("must be finite and >= 0, got {v}")));
            }
        }
        if (w.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(
                "weight_technical + weight_fundamental + weight_risk",
                format!("must sum to 1, got {}", w.total()),
            ));
        }

        for (field, v) in [
            ("default_position_size_percent", self.default_position_size_percent),
            ("max_position_size_percent", self.max_position_size_percent),
            ("default_stop_loss_percent", self.default_stop_loss_percent),
            ("min_confidence_threshold", self.min_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(field, format!("must be in [0, 1], got {v}")));
            }
        }
        if self.default_position_size_percent > self.max_position_size_percent {
            return Err(invalid(
                "default_position_size_percent",
                "must not exceed max_position_size_percent",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk_free_rate", "must be finite"));
        }

        self.technical.validate()?;
        self.fundamental.validate()?;
        self.risk.validate()?;
        self.confidence.validate()?;
        self.sizing.validate()?;
        self.ai.validate()?;
        self.cache.validate()?;
        Ok(ValidatedConfig(self))
    }
}

/// A configuration that passed [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConfig(EngineConfig);

impl ValidatedConfig {
    pub fn into_inner(self) -> EngineConfig {
        self.0
    }
}

impl Deref for ValidatedConfig {
    type Target = EngineConfig;

    fn deref(&self) -> &EngineConfig {
        &self.0
    }
}
