//! Error types for the service protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in error envelopes.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed envelope or payload.
    InvalidRequest,
    /// The profile is not allowed to perform the operation.
    AccessDenied,
    /// Too many requests; the caller should slow down.
    Throttled,
    /// Referenced upload or job does not exist.
    ResourceNotFound,
    /// Payload is well-formed but semantically rejected.
    ValidationFailed,
    /// Unexpected service-side failure.
    Internal,
    /// Unknown operation requested.
    UnknownOperation,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::AccessDenied => write!(f, "ACCESS_DENIED"),
            Self::Throttled => write!(f, "THROTTLED"),
            Self::ResourceNotFound => write!(f, "RESOURCE_NOT_FOUND"),
            Self::ValidationFailed => write!(f, "VALIDATION_FAILED"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
        }
    }
}

/// Error payload of a failed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new service error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create a VALIDATION_FAILED error naming the offending field.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::with_data(
            ErrorCode::ValidationFailed,
            message,
            serde_json::json!({ "field": field }),
        )
    }

    /// Create a RESOURCE_NOT_FOUND error for an upload.
    pub fn upload_not_found(upload_id: &str) -> Self {
        Self::with_data(
            ErrorCode::ResourceNotFound,
            format!("upload '{}' not found", upload_id),
            serde_json::json!({ "upload_id": upload_id }),
        )
    }

    /// Create a RESOURCE_NOT_FOUND error for a job.
    pub fn job_not_found(job_id: &str) -> Self {
        Self::with_data(
            ErrorCode::ResourceNotFound,
            format!("job '{}' not found", job_id),
            serde_json::json!({ "job_id": job_id }),
        )
    }

    /// Create a THROTTLED error with retry information.
    pub fn throttled(retry_after_seconds: u32) -> Self {
        Self::with_data(
            ErrorCode::Throttled,
            format!("rate exceeded, retry after {} seconds", retry_after_seconds),
            serde_json::json!({ "retry_after_seconds": retry_after_seconds }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}
