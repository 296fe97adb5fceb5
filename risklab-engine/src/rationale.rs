//! AI-reasoning collaborator.
//!
//! Produces free-text rationale for an already-computed decision. The text is
//! advisory: it is attached to the record after the numbers are final and can
//! never change action, confidence or size. Every call runs under a bounded
//! timeout ([`TimeoutRationale`]).

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use risklab_core::ParamError;

use crate::decision::{Action, DecisionRecord};
use crate::error::CollaboratorError;

/// `[ai]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Hard deadline for one rationale, including the HTTP round trip.
    pub timeout_ms: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 300,
            timeout_ms: 10_000,
            api_key_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.timeout_ms == 0 {
            return Err(ParamError::new("ai.timeout_ms", "must be > 0"));
        }
        if self.max_tokens == 0 {
            return Err(ParamError::new("ai.max_tokens", "must be > 0"));
        }
        if self.enabled && self.endpoint.trim().is_empty() {
            return Err(ParamError::new("ai.endpoint", "required when ai.enabled"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the collaborator is told about a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleRequest {
    pub symbol: String,
    pub action: Action,
    pub composite_score: f64,
    pub confidence: f64,
    pub technical_score: Option<f64>,
    pub fundamental_score: Option<f64>,
    pub var_95: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub sharpe: Option<f64>,
    pub volatility: Option<f64>,
    pub beta: Option<f64>,
}

impl RationaleRequest {
    pub fn from_record(record: &DecisionRecord) -> Self {
        let risk = record.risk.as_ref();
        Self {
            symbol: record.symbol.clone(),
            action: record.action,
            composite_score: record.risk_adjusted_score,
            confidence: record.confidence,
            technical_score: record.technical_score,
            fundamental_score: record.fundamental_score,
            var_95: risk.and_then(|r| r.var_95).map(|v| v.quantile),
            max_drawdown: risk.and_then(|r| r.max_drawdown()),
            sharpe: risk.and_then(|r| r.sharpe),
            volatility: risk.and_then(|r| r.volatility),
            beta: risk.and_then(|r| r.beta),
        }
    }

    /// Plain-text prompt describing the numeric decision.
    pub fn prompt(&self) -> String {
        fn fmt(v: Option<f64>) -> String {
            v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.4}"))
        }
        let action = match self.action {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        };
        format!(
            "Explain the {action} recommendation for {symbol} in 2-3 sentences, \
             focusing on the factors that drive it.\n\n\
             Composite score: {composite:.4}\n\
             Confidence: {confidence:.1}%\n\
             Technical score: {technical}\n\
             Fundamental score: {fundamental}\n\
             VaR 95% (1-day return): {var}\n\
             Max drawdown: {dd}\n\
             Sharpe: {sharpe}\n\
             Annualized volatility: {vol}\n\
             Beta: {beta}\n",
            symbol = self.symbol,
            composite = self.composite_score,
            confidence = self.confidence * 100.0,
            technical = fmt(self.technical_score),
            fundamental = fmt(self.fundamental_score),
            var = fmt(self.var_95),
            dd = fmt(self.max_drawdown),
            sharpe = fmt(self.sharpe),
            vol = fmt(self.volatility),
            beta = fmt(self.beta),
        )
    }
}

pub trait RationaleProvider: Send + Sync {
    fn name(&self) -> &str;

    fn rationale(&self, request: &RationaleRequest) -> Result<String, CollaboratorError>;
}

// ─── HTTP provider ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Messages-API client over blocking `reqwest`.
pub struct HttpRationaleProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    timeout_ms: u64,
    api_key: String,
}

impl HttpRationaleProvider {
    const NAME: &'static str = "http-rationale";

    pub fn new(config: &AiConfig, api_key: impl Into<String>) -> Result<Self, CollaboratorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CollaboratorError::unavailable(Self::NAME, e))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_ms: config.timeout_ms,
            api_key: api_key.into(),
        })
    }

    /// Reads the key from `config.api_key_env`.
    pub fn from_env(config: &AiConfig) -> Result<Self, CollaboratorError> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CollaboratorError::unavailable(
                    Self::NAME,
                    format!("{} is not set", config.api_key_env),
                )
            })?;
        Self::new(config, key)
    }

    fn parse_response(body: MessagesResponse) -> Result<String, CollaboratorError> {
        let text: Vec<String> = body
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        let joined = text.join("\n").trim().to_string();
        if joined.is_empty() {
            return Err(CollaboratorError::invalid(Self::NAME, "no text content"));
        }
        Ok(joined)
    }
}

impl RationaleProvider for HttpRationaleProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn rationale(&self, request: &RationaleRequest) -> Result<String, CollaboratorError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: request.prompt(),
            }],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout {
                        collaborator: Self::NAME.into(),
                        after_ms: self.timeout_ms,
                    }
                } else {
                    CollaboratorError::unavailable(Self::NAME, e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::unavailable(
                Self::NAME,
                format!("HTTP {status}"),
            ));
        }
        let parsed: MessagesResponse = resp
            .json()
            .map_err(|e| CollaboratorError::invalid(Self::NAME, e))?;
        Self::parse_response(parsed)
    }
}

// ─── Bounded timeout ────────────────────────────────────────────────

/// Runs any provider on a worker thread and abandons it after `timeout`.
///
/// An abandoned call keeps running in the background until the inner provider
/// returns; its result is dropped.
pub struct TimeoutRationale {
    inner: Arc<dyn RationaleProvider>,
    timeout: Duration,
}

impl TimeoutRationale {
    pub fn new(inner: Arc<dyn RationaleProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl RationaleProvider for TimeoutRationale {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn rationale(&self, request: &RationaleRequest) -> Result<String, CollaboratorError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        thread::Builder::new()
            .name("risklab-rationale".into())
            .spawn(move || {
                // Receiver may be gone after a timeout.
                let _ = tx.send(inner.rationale(&request));
            })
            .map_err(|e| CollaboratorError::unavailable(self.inner.name(), e))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    collaborator = self.inner.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "rationale timed out"
                );
                Err(CollaboratorError::Timeout {
                    collaborator: self.inner.name().to_string(),
                    after_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CollaboratorError::unavailable(
                self.inner.name(),
                "worker exited without a result",
            )),
        }
    }
}

/// Fixed-text provider, useful offline and in tests.
#[derive(Debug, Clone)]
pub struct StaticRationale(pub String);

impl RationaleProvider for StaticRationale {
    fn name(&self) -> &str {
        "static"
    }

    fn rationale(&self, _request: &RationaleRequest) -> Result<String, CollaboratorError> {
        Ok(self.0.clone())
    }
}
