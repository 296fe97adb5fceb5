//! Engine-level error types.

use thiserror::Error;

use crate::config::ConfigError;

/// An external collaborator (data source, sink, rationale provider) failed.
///
/// Never fatal to the numeric decision: missing price data shrinks the
/// technical input set, a missing rationale leaves the text empty.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {after_ms} ms")]
    Timeout { collaborator: String, after_ms: u64 },

    #[error("{collaborator} unavailable: {reason}")]
    Unavailable { collaborator: String, reason: String },

    #[error("{collaborator} returned an invalid response: {reason}")]
    InvalidResponse { collaborator: String, reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidResponse {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to fingerprint decision inputs: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_collaborator() {
        let e = CollaboratorError::Timeout {
            collaborator: "rationale".into(),
            after_ms: 250,
        };
        assert_eq!(e.to_string(), "rationale timed out after 250 ms");
        let e = CollaboratorError::unavailable("csv", "no such file");
        assert_eq!(e.to_string(), "csv unavailable: no such file");
    }
}
