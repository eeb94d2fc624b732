//! Backend failure taxonomy and normalization
//!
//! Gateways surface every fault as a categorized [`BackendFailure`] value.
//! The normalizer maps each category onto the response envelope's status
//! code and message policy, logging the original backend message at error
//! severity before it is wrapped. Classified store failures surface a
//! fixed, stable code; unclassified ones pass their message through; remote
//! protocol faults surface a deliberately generic message.

use thiserror::Error;
use tracing::error;

use crate::response::{FailureBody, OperationResult, Severity};

/// Fixed code surfaced when the store rejects a mutation on a constraint
pub const INTEGRITY_CONSTRAINT_ERROR: &str = "INTEGRITY_CONSTRAINT_ERROR";
/// Fixed code surfaced when the store connection cannot be obtained or dies
pub const DATABASE_CONNECTION_ERROR: &str = "DATABASE_CONNECTION_ERROR";
/// Generic message for remote catalog faults; details stay in the logs
pub const REMOTE_FAULT_MESSAGE: &str = "There is an error. Check the logs for the details.";

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Categorized failure raised by a backend gateway
#[derive(Debug, Error)]
pub enum BackendFailure {
    #[error("integrity constraint violation: {message}")]
    IntegrityConstraintViolation {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("protocol error: {message}")]
    ProtocolError {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

impl BackendFailure {
    pub fn integrity(message: impl Into<String>) -> Self {
        BackendFailure::IntegrityConstraintViolation {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        BackendFailure::ConnectionError {
            message: message.into(),
            source: None,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        BackendFailure::ProtocolError {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BackendFailure::NotFound {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        BackendFailure::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error. NotFound is a plain outcome and keeps
    /// no cause.
    pub fn caused_by(mut self, cause: impl Into<Cause>) -> Self {
        match &mut self {
            BackendFailure::IntegrityConstraintViolation { source, .. }
            | BackendFailure::ConnectionError { source, .. }
            | BackendFailure::ProtocolError { source, .. }
            | BackendFailure::Unknown { source, .. } => *source = Some(cause.into()),
            BackendFailure::NotFound { .. } => {}
        }
        self
    }

    fn message(&self) -> &str {
        match self {
            BackendFailure::IntegrityConstraintViolation { message, .. }
            | BackendFailure::ConnectionError { message, .. }
            | BackendFailure::ProtocolError { message, .. }
            | BackendFailure::NotFound { message }
            | BackendFailure::Unknown { message, .. } => message,
        }
    }

    fn cause_text(&self) -> Option<String> {
        use std::error::Error;
        self.source().map(|cause| cause.to_string())
    }
}

/// Map a backend failure onto the response envelope.
///
/// The original backend message is logged before the failure is wrapped, so
/// generic user-visible messages never lose the underlying detail.
pub fn normalize(failure: &BackendFailure) -> OperationResult {
    error!(failure = %failure, "backend operation failed");

    let body = match failure {
        BackendFailure::IntegrityConstraintViolation { .. } => {
            FailureBody::new(500, INTEGRITY_CONSTRAINT_ERROR).with_severity(Severity::Error)
        }
        BackendFailure::ConnectionError { .. } => {
            FailureBody::new(500, DATABASE_CONNECTION_ERROR).with_severity(Severity::Error)
        }
        BackendFailure::ProtocolError { .. } => {
            let body = FailureBody::new(500, REMOTE_FAULT_MESSAGE);
            match failure.cause_text() {
                Some(cause) => body.with_cause(cause),
                None => body.with_cause(failure.message().to_string()),
            }
        }
        BackendFailure::NotFound { message } => FailureBody::new(404, message.clone()),
        BackendFailure::Unknown { message, .. } => {
            let body = FailureBody::new(500, message.clone());
            match failure.cause_text() {
                Some(cause) => body.with_cause(cause),
                None => body,
            }
        }
    };

    OperationResult::failure(body)
}

/// Failure returned when a scoped operation references a missing parent.
///
/// This is a normal branch outcome for the caller, not a server error.
pub fn parent_not_found(parent_entity: &str) -> OperationResult {
    OperationResult::failure(FailureBody::new(
        401,
        format!("Parent {parent_entity} does not exist"),
    ))
}
