//! Coarse risk label from annualized volatility.

use serde::{Deserialize, Serialize};

use crate::risk::RiskParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Strictly above `high_volatility` is HIGH, strictly above
    /// `medium_volatility` is MEDIUM, anything else LOW.
    pub fn classify(volatility: f64, params: &RiskParams) -> Self {
        if volatility > params.high_volatility {
            Self::High
        } else if volatility > params.medium_volatility {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
