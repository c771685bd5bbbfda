//! Fix requests and job creation

use std::fmt;
use std::path::PathBuf;

use codefix_protocol::ops::{
    JobStatus, Position, Range, RecommendationCustomization, ReferenceTrackerConfiguration,
    StartFixJobRequest,
};
use codefix_protocol::Profile;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::FixError;
use crate::host::ServiceClient;
use crate::upload::ArtifactReference;

/// Input to one orchestration run
///
/// Lines are 0-indexed as reported by the detector, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRequest {
    pub file: PathBuf,
    pub start_line: u32,
    pub end_line: u32,
    pub recommendation: String,
    pub rule_id: String,
    pub detector_id: String,
    pub fix_name: String,
    pub language: String,
}

/// Fix request validation errors
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("start line {start_line} is after end line {end_line}")]
    InvertedRange { start_line: u32, end_line: u32 },

    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

impl FixRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.start_line > self.end_line {
            return Err(RequestError::InvertedRange {
                start_line: self.start_line,
                end_line: self.end_line,
            });
        }
        for (name, value) in [
            ("recommendation", &self.recommendation),
            ("rule_id", &self.rule_id),
            ("fix_name", &self.fix_name),
        ] {
            if value.trim().is_empty() {
                return Err(RequestError::MissingField(name));
            }
        }
        if self.file.as_os_str().is_empty() {
            return Err(RequestError::MissingField("file"));
        }
        Ok(())
    }
}

/// Range conversion between the detector's convention and the service's
pub struct FixRange;

impl FixRange {
    /// Convert a 0-indexed issue range to the submitted snippet range
    ///
    /// The start line is shifted by one, the end line is passed through.
    pub fn from_issue(start_line: u32, end_line: u32) -> Range {
        Range {
            start: Position {
                line: start_line.saturating_add(1),
                character: 0,
            },
            end: Position {
                line: end_line,
                character: 0,
            },
        }
    }
}

/// Whether suggestions derived from licensed code may be returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    Allow,
    Block,
}

impl ReferencePolicy {
    /// Derive the policy from the "include suggestions with code references" setting
    pub fn from_setting(include_suggestions_with_code_references: bool) -> Self {
        if include_suggestions_with_code_references {
            ReferencePolicy::Allow
        } else {
            ReferencePolicy::Block
        }
    }

    fn to_wire(self) -> RecommendationCustomization {
        match self {
            ReferencePolicy::Allow => RecommendationCustomization::Allow,
            ReferencePolicy::Block => RecommendationCustomization::Block,
        }
    }
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferencePolicy::Allow => write!(f, "allow"),
            ReferencePolicy::Block => write!(f, "block"),
        }
    }
}

/// Everything job creation needs besides the uploaded artifact
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub range: Range,
    pub recommendation: String,
    pub policy: ReferencePolicy,
    pub fix_name: String,
    pub rule_id: String,
}

impl JobSubmission {
    pub fn from_request(request: &FixRequest, policy: ReferencePolicy) -> Self {
        Self {
            range: FixRange::from_issue(request.start_line, request.end_line),
            recommendation: request.recommendation.clone(),
            policy,
            fix_name: request.fix_name.clone(),
            rule_id: request.rule_id.clone(),
        }
    }
}

/// A job created on the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJob {
    pub job_id: String,
    pub status: JobStatus,
}

/// Create a remote fix job for an uploaded artifact
///
/// A job the service reports as FAILED right away is a creation failure;
/// its id is still carried in the error.
pub async fn create_job(
    client: &ServiceClient,
    artifact: ArtifactReference,
    submission: &JobSubmission,
    profile: Option<&Profile>,
    token: &CancelToken,
) -> Result<RemoteJob, FixError> {
    token.check()?;

    let request = StartFixJobRequest {
        upload_id: artifact.upload_id,
        snippet_range: submission.range,
        description: submission.recommendation.clone(),
        rule_id: Some(submission.rule_id.clone()),
        code_fix_name: Some(submission.fix_name.clone()),
        reference_tracker_configuration: ReferenceTrackerConfiguration {
            recommendation_customization: submission.policy.to_wire(),
        },
    };

    let response = client
        .start_fix_job(&request, profile)
        .await
        .map_err(|e| FixError::JobCreationFailed {
            job_id: None,
            reason: e.to_string(),
        })?;

    if response.status == JobStatus::Failed {
        return Err(FixError::JobCreationFailed {
            job_id: Some(response.job_id),
            reason: "service reported FAILED at creation".to_string(),
        });
    }

    tracing::debug!(
        job_id = %response.job_id,
        status = ?response.status,
        policy = %submission.policy,
        "fix job created"
    );

    Ok(RemoteJob {
        job_id: response.job_id,
        status: response.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockTransport;
    use crate::mock::MockService;
    use codefix_protocol::ops::CreateUploadUrlRequest;
    use codefix_protocol::{ErrorCode, Operation};
    use sha2::{Digest, Sha256};
    use std::sync::Arc;

    fn request() -> FixRequest {
        FixRequest {
            file: PathBuf::from("src/handler.py"),
            start_line: 4,
            end_line: 9,
            recommendation: "Avoid eval on untrusted input".to_string(),
            rule_id: "python-eval".to_string(),
            detector_id: "python/eval@v1".to_string(),
            fix_name: "Replace eval".to_string(),
            language: "python".to_string(),
        }
    }

    async fn uploaded(service: &MockService, client: &ServiceClient) -> ArtifactReference {
        let content = b"archive".to_vec();
        let location = client
            .create_upload_url(
                &CreateUploadUrlRequest {
                    content_sha256: hex::encode(Sha256::digest(&content)),
                    content_length: content.len() as u64,
                    artifact_type: codefix_protocol::ops::ArtifactType::SourceCode,
                    upload_intent: codefix_protocol::ops::UploadIntent::CodeFixGeneration,
                    upload_context: codefix_protocol::ops::UploadContext {
                        fix_name: "Replace eval".to_string(),
                    },
                },
                None,
            )
            .await
            .unwrap();
        service
            .receive_upload(&location.upload_url, &content)
            .unwrap();
        ArtifactReference {
            artifact_type: codefix_protocol::ops::ArtifactType::SourceCode,
            upload_id: location.upload_id,
        }
    }

    fn setup() -> (MockService, ServiceClient) {
        let service = MockService::new();
        let client = ServiceClient::new(Arc::new(MockTransport::with_service(service.clone())));
        (service, client)
    }

    #[test]
    fn test_range_conversion() {
        let range = FixRange::from_issue(4, 9);
        assert_eq!(range.start, Position { line: 5, character: 0 });
        assert_eq!(range.end, Position { line: 9, character: 0 });
    }

    #[test]
    fn test_reference_policy_from_setting() {
        assert_eq!(ReferencePolicy::from_setting(true), ReferencePolicy::Allow);
        assert_eq!(ReferencePolicy::from_setting(false), ReferencePolicy::Block);
    }

    #[test]
    fn test_validate() {
        assert!(request().validate().is_ok());

        let mut inverted = request();
        inverted.start_line = 10;
        assert!(matches!(
            inverted.validate(),
            Err(RequestError::InvertedRange { .. })
        ));

        let mut blank = request();
        blank.rule_id = "  ".to_string();
        assert!(matches!(
            blank.validate(),
            Err(RequestError::MissingField("rule_id"))
        ));
    }

    #[test]
    fn test_request_from_json() {
        let parsed: FixRequest = serde_json::from_str(
            r#"{
                "file": "src/handler.py",
                "start_line": 4,
                "end_line": 9,
                "recommendation": "Avoid eval on untrusted input",
                "rule_id": "python-eval",
                "detector_id": "python/eval@v1",
                "fix_name": "Replace eval",
                "language": "python"
            }"#,
        )
        .unwrap();
        assert_eq!(parsed, request());
    }

    #[tokio::test]
    async fn test_create_job_sends_submission() {
        let (service, client) = setup();
        service.set_next_job_id("job-123");
        let artifact = uploaded(&service, &client).await;
        let submission = JobSubmission::from_request(&request(), ReferencePolicy::Block);

        let job = create_job(&client, artifact, &submission, None, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(job.job_id, "job-123");
        assert_eq!(job.status, JobStatus::Pending);

        let sent = service.job("job-123").unwrap().request;
        assert_eq!(sent.snippet_range, FixRange::from_issue(4, 9));
        assert_eq!(sent.rule_id.as_deref(), Some("python-eval"));
        assert_eq!(
            sent.reference_tracker_configuration.recommendation_customization,
            RecommendationCustomization::Block
        );
    }

    #[tokio::test]
    async fn test_immediate_failure_is_creation_failure() {
        let (service, client) = setup();
        service.set_next_job_id("job-bad");
        service.set_initial_status(JobStatus::Failed);
        let artifact = uploaded(&service, &client).await;
        let submission = JobSubmission::from_request(&request(), ReferencePolicy::Allow);

        let result = create_job(&client, artifact, &submission, None, &CancelToken::new()).await;

        match result {
            Err(FixError::JobCreationFailed { job_id, .. }) => {
                assert_eq!(job_id.as_deref(), Some("job-bad"))
            }
            other => panic!("expected JobCreationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_error_is_creation_failure() {
        let (service, client) = setup();
        service.inject_error(Operation::StartFixJob, ErrorCode::Internal, "boom");
        let artifact = uploaded(&service, &client).await;
        let submission = JobSubmission::from_request(&request(), ReferencePolicy::Allow);

        let result = create_job(&client, artifact, &submission, None, &CancelToken::new()).await;

        assert!(matches!(
            result,
            Err(FixError::JobCreationFailed { job_id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_creation() {
        let (service, client) = setup();
        let artifact = uploaded(&service, &client).await;
        let submission = JobSubmission::from_request(&request(), ReferencePolicy::Allow);
        let token = CancelToken::new();
        token.cancel();

        let result = create_job(&client, artifact, &submission, None, &token).await;

        assert!(matches!(result, Err(FixError::Cancelled)));
        assert_eq!(service.calls(Operation::StartFixJob), 0);
    }
}
