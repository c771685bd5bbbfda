//! Code-fix job types.
//!
//! Job creation and status queries.

use serde::{Deserialize, Serialize};

/// Status of a remote code-fix job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, not yet started.
    Pending,
    /// Generating the fix.
    InProgress,
    /// Fix is available.
    Succeeded,
    /// Generation failed.
    Failed,
}

impl JobStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Position inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Half-open structural range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Whether suggestions with license-encumbered references are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationCustomization {
    Allow,
    Block,
}

/// Reference tracker settings for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTrackerConfiguration {
    pub recommendation_customization: RecommendationCustomization,
}

/// start_fix_job request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFixJobRequest {
    /// Upload holding the packaged source.
    pub upload_id: String,
    /// Range of the snippet to fix.
    pub snippet_range: Range,
    /// Recommendation text describing the issue.
    pub description: String,
    /// Rule that reported the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Human-readable fix name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_fix_name: Option<String>,
    /// Reference license policy.
    pub reference_tracker_configuration: ReferenceTrackerConfiguration,
}

/// start_fix_job response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFixJobResponse {
    /// Identifier of the created job.
    pub job_id: String,
    /// Status right after creation.
    pub status: JobStatus,
}

/// get_fix_job request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFixJobRequest {
    pub job_id: String,
}

/// get_fix_job response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFixJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_start_request_shape() {
        let request = StartFixJobRequest {
            upload_id: "upload-1".to_string(),
            snippet_range: Range {
                start: Position { line: 5, character: 0 },
                end: Position { line: 9, character: 0 },
            },
            description: "Avoid hardcoded credentials".to_string(),
            rule_id: Some("hardcoded-credentials".to_string()),
            code_fix_name: None,
            reference_tracker_configuration: ReferenceTrackerConfiguration {
                recommendation_customization: RecommendationCustomization::Block,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["snippet_range"]["start"], json!({"line": 5, "character": 0}));
        assert_eq!(
            value["reference_tracker_configuration"]["recommendation_customization"],
            "BLOCK"
        );
        assert!(value.get("code_fix_name").is_none());
    }
}
