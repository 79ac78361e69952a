//! Error taxonomy for the registration workflow
//!
//! Gateways report [`GatewayError`]s. The orchestrator turns every failure
//! into a [`WorkflowError`] tagged with the phase it happened in; nothing
//! escapes the orchestrator in any other form.

use registration_validation::ValidationResult;
use serde::{Deserialize, Serialize};

use crate::phase::WorkflowPhase;

/// Category of a workflow failure
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Client-correctable input problem. Fix the input, then submit again.
    Validation,
    /// Backend 5xx while creating the entity
    Server,
    /// Malformed or oversized document
    Upload,
    /// OCR / IPFS verification engine unavailable
    Ocr,
    /// Ledger congestion or signer unavailable
    Ledger,
    /// Missing or rejected bearer token
    Auth,
    /// Transport failure or timeout
    Network,
    /// Call accepted by the backend but its response was unusable. Retrying
    /// could repeat a side effect that already happened.
    Protocol,
    /// Step invoked out of order
    InvalidTransition,
    /// Step already running; the call was ignored
    PhaseInFlight,
    /// Saved workflow state is inconsistent
    InvalidSnapshot,
}

impl ErrorKind {
    /// Whether re-invoking the same step unchanged can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Server
                | ErrorKind::Upload
                | ErrorKind::Ocr
                | ErrorKind::Ledger
                | ErrorKind::Network
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Server => "server",
            ErrorKind::Upload => "upload",
            ErrorKind::Ocr => "ocr",
            ErrorKind::Ledger => "ledger",
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::PhaseInFlight => "phase_in_flight",
            ErrorKind::InvalidSnapshot => "invalid_snapshot",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backend gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("rejected by backend: {0}")]
    Validation(String),
    #[error("backend error: {0}")]
    Server(String),
    #[error("document rejected: {0}")]
    Upload(String),
    #[error("verification engine unavailable: {0}")]
    Ocr(String),
    #[error("ledger anchoring failed: {0}")]
    Ledger(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("unusable backend response: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::Server(_) => ErrorKind::Server,
            GatewayError::Upload(_) => ErrorKind::Upload,
            GatewayError::Ocr(_) => ErrorKind::Ocr,
            GatewayError::Ledger(_) => ErrorKind::Ledger,
            GatewayError::Auth(_) => ErrorKind::Auth,
            GatewayError::Network(_) => ErrorKind::Network,
            GatewayError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

/// A failure surfaced to the caller of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{phase}: {kind} error: {message}")]
pub struct WorkflowError {
    /// Phase the workflow was in when the failure happened
    pub phase: WorkflowPhase,
    pub kind: ErrorKind,
    pub message: String,
    /// Field-level details for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl WorkflowError {
    pub fn new(phase: WorkflowPhase, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind,
            message: message.into(),
            validation: None,
        }
    }

    pub fn validation(phase: WorkflowPhase, errors: ValidationResult) -> Self {
        Self {
            phase,
            kind: ErrorKind::Validation,
            message: errors.to_string(),
            validation: Some(errors),
        }
    }

    pub fn from_gateway(phase: WorkflowPhase, error: GatewayError) -> Self {
        Self::new(phase, error.kind(), error.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration_validation::ValidationErrorCode;

    #[test]
    fn test_retryable_kinds() {
        for kind in [
            ErrorKind::Server,
            ErrorKind::Upload,
            ErrorKind::Ocr,
            ErrorKind::Ledger,
            ErrorKind::Network,
        ] {
            assert!(kind.is_retryable(), "{} should be retryable", kind);
        }
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Auth,
            ErrorKind::Protocol,
            ErrorKind::InvalidTransition,
            ErrorKind::PhaseInFlight,
            ErrorKind::InvalidSnapshot,
        ] {
            assert!(!kind.is_retryable(), "{} should not be retryable", kind);
        }
    }

    #[test]
    fn test_gateway_error_conversion() {
        let err = WorkflowError::from_gateway(
            WorkflowPhase::EntityCreated,
            GatewayError::Ocr("engine offline".to_string()),
        );
        assert_eq!(err.kind, ErrorKind::Ocr);
        assert_eq!(err.phase, WorkflowPhase::EntityCreated);
        assert_eq!(
            err.to_string(),
            "ENTITY_CREATED: ocr error: verification engine unavailable: engine offline"
        );
    }

    #[test]
    fn test_validation_error_keeps_field_details() {
        let mut errors = ValidationResult::new();
        errors.add_error("age", "Age is required", ValidationErrorCode::Required);
        let err = WorkflowError::validation(WorkflowPhase::CollectingForm, errors);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.validation.as_ref().unwrap().has_error_for("age"));
        assert!(err.message.contains("Age is required"));
    }
}
