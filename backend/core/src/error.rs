use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DocumentKind, ValidationOutcome};

/// Top-level error type for the document intake runtime.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Image rejected before inference. Always recoverable by re-submission.
    #[error("image rejected for {kind}: {outcome}")]
    Validation {
        kind: DocumentKind,
        outcome: ValidationOutcome,
    },

    /// A single inference attempt failed; the caller may retry.
    #[error("inference failed for {kind}: {failure}")]
    Inference {
        kind: DocumentKind,
        failure: InferenceFailure,
    },

    /// The shared model could not be loaded or has been released. Fatal for the process.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The downstream workbook hand-off failed. Collected results are kept.
    #[error("workbook submission failed: {0}")]
    IntegrationFailure(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntakeError {
    /// Whether this error must stop the owning process rather than a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IntakeError::ModelUnavailable(_))
    }
}

/// Why one inference attempt did not yield a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InferenceFailure {
    #[error("inference timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("model backend error: {message}")]
    Backend { message: String },

    #[error("model returned no text")]
    EmptyOutput,

    #[error("missing required fields: {}", missing.join(", "))]
    MissingFields { missing: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_model_unavailable_is_fatal() {
        assert!(IntakeError::ModelUnavailable("weights missing".into()).is_fatal());
        assert!(!IntakeError::IntegrationFailure("502".into()).is_fatal());
        assert!(!IntakeError::Inference {
            kind: DocumentKind::LogCard,
            failure: InferenceFailure::EmptyOutput,
        }
        .is_fatal());
    }

    #[test]
    fn test_failure_messages() {
        let failure = InferenceFailure::MissingFields {
            missing: vec!["Name".into(), "License Number".into()],
        };
        assert_eq!(failure.to_string(), "missing required fields: Name, License Number");
        assert_eq!(
            InferenceFailure::Timeout { after_secs: 300 }.to_string(),
            "inference timed out after 300s"
        );
    }
}
