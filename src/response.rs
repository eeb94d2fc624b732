//! Operation results and the wire response envelope
//!
//! Every dispatch produces exactly one [`OperationResult`], either Success or
//! Failure, never both. Results are constructed once and not mutated
//! afterwards. The serialized form is the envelope
//! `{ success, data?, error? }` with `error` carrying `statusCode`,
//! `message` and an optional `cause`.

use serde::Serialize;

use crate::request::EntityRecord;

/// Severity tag attached to classified backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Payload of a successful operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultData {
    Record(EntityRecord),
    Records(Vec<EntityRecord>),
}

/// Error half of the response envelope
#[derive(Debug, Clone, Serialize)]
pub struct FailureBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Internal classification tag; not part of the wire envelope
    #[serde(skip)]
    pub severity: Option<Severity>,
}

impl FailureBody {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            cause: None,
            severity: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// Outcome of one dispatched operation
#[derive(Debug, Clone)]
pub enum OperationResult {
    /// Mutations without a result row (update, delete) succeed with no data
    Success { data: Option<ResultData> },
    Failure(FailureBody),
}

impl OperationResult {
    pub fn success_record(record: EntityRecord) -> Self {
        OperationResult::Success {
            data: Some(ResultData::Record(record)),
        }
    }

    pub fn success_records(records: Vec<EntityRecord>) -> Self {
        OperationResult::Success {
            data: Some(ResultData::Records(records)),
        }
    }

    pub fn success_empty() -> Self {
        OperationResult::Success { data: None }
    }

    pub fn failure(body: FailureBody) -> Self {
        OperationResult::Failure(body)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    /// Single record of a successful result, if any
    pub fn as_record(&self) -> Option<&EntityRecord> {
        match self {
            OperationResult::Success {
                data: Some(ResultData::Record(record)),
            } => Some(record),
            _ => None,
        }
    }

    /// Record sequence of a successful result, if any
    pub fn as_records(&self) -> Option<&[EntityRecord]> {
        match self {
            OperationResult::Success {
                data: Some(ResultData::Records(records)),
            } => Some(records),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailureBody> {
        match self {
            OperationResult::Failure(body) => Some(body),
            _ => None,
        }
    }

    /// Convert into the serializable wire envelope
    pub fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope::from(self)
    }
}

/// Wire shape returned to callers for every operation
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureBody>,
}

impl From<OperationResult> for ResponseEnvelope {
    fn from(result: OperationResult) -> Self {
        match result {
            OperationResult::Success { data } => ResponseEnvelope {
                success: true,
                data,
                error: None,
            },
            OperationResult::Failure(body) => ResponseEnvelope {
                success: false,
                data: None,
                error: Some(body),
            },
        }
    }
}
