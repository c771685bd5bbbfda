//! RPC request types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported service operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Issues a presigned location for a single artifact upload.
    CreateUploadUrl,
    /// Creates a code-fix job over an uploaded artifact.
    StartFixJob,
    /// Returns the current status of a code-fix job.
    GetFixJob,
    /// Returns the suggested fix of a finished job.
    GetFixResult,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateUploadUrl => "create_upload_url",
            Operation::StartFixJob => "start_fix_job",
            Operation::GetFixJob => "get_fix_job",
            Operation::GetFixResult => "get_fix_result",
        }
    }

    /// Returns true if repeating the call has no additional effect.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Operation::GetFixJob | Operation::GetFixResult)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization/profile context attached to every call.
///
/// Opaque to the client: it is resolved once per run and echoed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier issued by the service.
    pub arn: String,
    /// Region the profile lives in.
    pub region: String,
}

impl Profile {
    pub fn new(arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            region: region.into(),
        }
    }
}

/// RPC request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version.
    pub protocol_version: i32,
    /// Operation to perform.
    pub op: Operation,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Profile context for authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}
