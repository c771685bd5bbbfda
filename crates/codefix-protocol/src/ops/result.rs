//! Fix result types.

use serde::{Deserialize, Serialize};

use super::job::JobStatus;

/// get_fix_result request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFixResultRequest {
    pub job_id: String,
}

/// get_fix_result response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFixResultResponse {
    pub job_id: String,
    pub status: JobStatus,
    /// Absent when the service has nothing to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,
}

/// Structured fix produced by a succeeded job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    /// Unified diff against the uploaded source.
    pub code_diff: String,
    /// Explanation of the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Licensed code the fix is derived from.
    #[serde(default)]
    pub references: Vec<CodeReference>,
}

/// Attribution for licensed code used by a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_content_span: Option<ContentSpan>,
}

/// Character span inside the suggested code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpan {
    pub start: u32,
    pub end: u32,
}
