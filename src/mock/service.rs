//! Mock service request handling

use std::sync::{Arc, Mutex, MutexGuard};

use codefix_protocol::ops::{
    CreateUploadUrlRequest, CreateUploadUrlResponse, GetFixJobRequest, GetFixJobResponse,
    GetFixResultRequest, GetFixResultResponse, JobStatus, StartFixJobRequest,
    StartFixJobResponse, SuggestedFix,
};
use codefix_protocol::{
    ErrorCode, Operation, RpcRequest, RpcResponse, ServiceError, PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::host::TransportError;

use super::failure::{FailureConfig, FailureInjector};
use super::state::{Job, MockState, Upload};

/// URL scheme for mock presigned locations
pub const MOCK_UPLOAD_PREFIX: &str = "mock://uploads/";

const TRANSFER: &str = "transfer";

/// Mock analysis service
///
/// Cheap to clone; clones share state, so a test can keep a handle for
/// configuration and assertions while the transport owns another.
#[derive(Clone, Default)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl MockService {
    /// Create a new mock service with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn failures(&self) -> MutexGuard<'_, FailureInjector> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Configuration ===

    /// Use this id for the next created job
    pub fn set_next_job_id(&self, job_id: impl Into<String>) {
        self.state().next_job_id = Some(job_id.into());
    }

    /// Status reported by start_fix_job
    pub fn set_initial_status(&self, status: JobStatus) {
        self.state().initial_status = status;
    }

    /// Status sequence reported by get_fix_job for a job; the last repeats
    pub fn script_statuses(&self, job_id: impl Into<String>, statuses: Vec<JobStatus>) {
        self.state().scripts.insert(job_id.into(), statuses);
    }

    /// Status sequence for jobs without their own script
    pub fn set_default_script(&self, statuses: Vec<JobStatus>) {
        self.state().default_script = statuses;
    }

    /// Fix returned by get_fix_result
    pub fn set_fix(&self, fix: SuggestedFix) {
        self.state().fix = Some(fix);
    }

    /// Make get_fix_result succeed without a fix payload
    pub fn clear_fix(&self) {
        self.state().fix = None;
    }

    /// Inject a failure for an operation
    pub fn inject_failure(&self, op: Operation, config: FailureConfig) {
        self.failures().inject(op, config);
    }

    /// Inject an error for an operation on every call
    pub fn inject_error(&self, op: Operation, code: ErrorCode, message: impl Into<String>) {
        self.failures().inject_error(op, code, message);
    }

    /// Reject the next `count` presigned transfers
    pub fn fail_transfers(&self, count: u32) {
        self.state().transfer_failures = count;
    }

    // === Assertions ===

    /// Calls served for an operation
    pub fn calls(&self, op: Operation) -> u32 {
        self.state().calls.get(op.as_str()).copied().unwrap_or(0)
    }

    /// Presigned transfers attempted
    pub fn transfers(&self) -> u32 {
        self.state().calls.get(TRANSFER).copied().unwrap_or(0)
    }

    /// Every network call served, transfers included
    pub fn total_calls(&self) -> u32 {
        self.state().calls.values().sum()
    }

    /// Snapshot of a job
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.state().jobs.get(job_id).cloned()
    }

    /// Most recently created job
    pub fn last_job(&self) -> Option<Job> {
        let state = self.state();
        state
            .job_order
            .last()
            .and_then(|id| state.jobs.get(id))
            .cloned()
    }

    /// Snapshot of an upload
    pub fn upload(&self, upload_id: &str) -> Option<Upload> {
        self.state().uploads.get(upload_id).cloned()
    }

    // === Request handling ===

    /// Handle a request envelope
    pub fn handle_request(&self, request: &RpcRequest) -> RpcResponse {
        self.state().record_call(request.op.as_str());

        let result = match self.failures().check(request.op) {
            Some(error) => Err(error),
            None => self.dispatch(request),
        };

        match result {
            Ok(payload) => {
                RpcResponse::success(PROTOCOL_VERSION, request.request_id.clone(), payload)
            }
            Err(error) => RpcResponse::error(PROTOCOL_VERSION, request.request_id.clone(), error),
        }
    }

    fn dispatch(&self, request: &RpcRequest) -> Result<Value, ServiceError> {
        if request.protocol_version != PROTOCOL_VERSION {
            return Err(ServiceError::invalid_request(format!(
                "unsupported protocol version {}",
                request.protocol_version
            )));
        }

        match request.op {
            Operation::CreateUploadUrl => {
                let req = parse_payload(&request.payload)?;
                to_payload(&self.create_upload_url(req))
            }
            Operation::StartFixJob => {
                let req = parse_payload(&request.payload)?;
                to_payload(&self.start_fix_job(req)?)
            }
            Operation::GetFixJob => {
                let req = parse_payload(&request.payload)?;
                to_payload(&self.get_fix_job(req)?)
            }
            Operation::GetFixResult => {
                let req = parse_payload(&request.payload)?;
                to_payload(&self.get_fix_result(req)?)
            }
        }
    }

    fn create_upload_url(&self, req: CreateUploadUrlRequest) -> CreateUploadUrlResponse {
        let mut state = self.state();
        let upload_id = state.next_id("upload");
        let upload_url = format!("{}{}", MOCK_UPLOAD_PREFIX, upload_id);

        state.uploads.insert(
            upload_id.clone(),
            Upload {
                upload_id: upload_id.clone(),
                upload_url: upload_url.clone(),
                expected_sha256: req.content_sha256.clone(),
                expected_length: req.content_length,
                content: None,
            },
        );

        let mut request_headers = std::collections::BTreeMap::new();
        request_headers.insert(
            "x-codefix-content-sha256".to_string(),
            req.content_sha256,
        );

        CreateUploadUrlResponse {
            upload_id,
            upload_url,
            request_headers,
            expires_at: Some((chrono::Utc::now() + chrono::Duration::minutes(15)).to_rfc3339()),
        }
    }

    fn start_fix_job(&self, req: StartFixJobRequest) -> Result<StartFixJobResponse, ServiceError> {
        let mut state = self.state();

        match state.uploads.get(&req.upload_id) {
            None => return Err(ServiceError::upload_not_found(&req.upload_id)),
            Some(upload) if !upload.is_complete() => {
                return Err(ServiceError::validation(
                    "upload_id",
                    format!("upload '{}' has no content", req.upload_id),
                ))
            }
            Some(_) => {}
        }
        // Start lines arrive one-based, end lines zero-based.
        if req.snippet_range.start.line > req.snippet_range.end.line.saturating_add(1) {
            return Err(ServiceError::validation(
                "snippet_range",
                "start line after end line",
            ));
        }

        let job = state.create_job(req);
        Ok(StartFixJobResponse {
            job_id: job.job_id.clone(),
            status: job.status,
        })
    }

    fn get_fix_job(&self, req: GetFixJobRequest) -> Result<GetFixJobResponse, ServiceError> {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&req.job_id)
            .ok_or_else(|| ServiceError::job_not_found(&req.job_id))?;

        Ok(GetFixJobResponse {
            job_id: job.job_id.clone(),
            status: job.next_status(),
        })
    }

    fn get_fix_result(
        &self,
        req: GetFixResultRequest,
    ) -> Result<GetFixResultResponse, ServiceError> {
        let state = self.state();
        let job = state
            .jobs
            .get(&req.job_id)
            .ok_or_else(|| ServiceError::job_not_found(&req.job_id))?;

        let suggested_fix = if job.status == JobStatus::Succeeded {
            state.fix.clone()
        } else {
            None
        };

        Ok(GetFixResultResponse {
            job_id: job.job_id.clone(),
            status: job.status,
            suggested_fix,
        })
    }

    /// Accept bytes sent to a presigned location
    pub fn receive_upload(&self, url: &str, content: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        state.record_call(TRANSFER);

        if state.transfer_failures > 0 {
            state.transfer_failures -= 1;
            return Err(TransportError::Http {
                status: 503,
                body: "injected transfer failure".to_string(),
            });
        }

        let upload_id = url.strip_prefix(MOCK_UPLOAD_PREFIX).unwrap_or(url);
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| TransportError::Http {
                status: 404,
                body: format!("no upload location {}", url),
            })?;

        let digest = hex::encode(Sha256::digest(content));
        if digest != upload.expected_sha256 || content.len() as u64 != upload.expected_length {
            return Err(TransportError::Http {
                status: 400,
                body: "content does not match declared checksum".to_string(),
            });
        }

        upload.content = Some(content.to_vec());
        Ok(())
    }
}

fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ServiceError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ServiceError::invalid_request(format!("invalid payload: {}", e)))
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value)
        .map_err(|e| ServiceError::new(ErrorCode::Internal, e.to_string()))
}
