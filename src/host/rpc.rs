//! Service RPC Client
//!
//! Typed wrapper over a `Transport`: builds request envelopes, maps error
//! envelopes to `RpcError`, and retries throttled idempotent calls.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codefix_protocol::ops::{
    CreateUploadUrlRequest, CreateUploadUrlResponse, GetFixJobRequest, GetFixJobResponse,
    GetFixResultRequest, GetFixResultResponse, StartFixJobRequest, StartFixJobResponse,
};
use codefix_protocol::{
    ErrorCode, Operation, Profile, RpcRequest, RpcResponse, ServiceError, PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::transport::{Transport, TransportError};

/// Service client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum retries of an idempotent call answered with THROTTLED
    pub throttle_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            throttle_retries: 2,
            retry_initial_delay_ms: 500,
            retry_max_delay_ms: 5000,
        }
    }
}

/// RPC client errors
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Throttled: {message}")]
    Throttled {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Service error {code}: {message}")]
    Service { code: ErrorCode, message: String },
}

impl RpcError {
    /// Map an error envelope into a typed error
    pub fn from_service(error: ServiceError) -> Self {
        match error.code {
            ErrorCode::AccessDenied => RpcError::AccessDenied(error.message),
            ErrorCode::Throttled => RpcError::Throttled {
                retry_after_seconds: error
                    .data
                    .as_ref()
                    .and_then(|d| d.get("retry_after_seconds"))
                    .and_then(|v| v.as_u64()),
                message: error.message,
            },
            ErrorCode::ResourceNotFound => RpcError::NotFound(error.message),
            ErrorCode::InvalidRequest | ErrorCode::ValidationFailed => {
                RpcError::Invalid(error.message)
            }
            code => RpcError::Service {
                code,
                message: error.message,
            },
        }
    }
}

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Client for the remote analysis service
///
/// Every call carries the caller's profile; the client itself holds no
/// per-run state.
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    /// Request ID counter
    request_counter: AtomicU64,
}

impl ServiceClient {
    /// Create a new client with the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            request_counter: AtomicU64::new(0),
        }
    }

    /// Generate a unique request ID
    fn next_request_id(&self) -> String {
        let counter = self.request_counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("req-{:x}-{:08x}", timestamp, counter)
    }

    // === Public RPC Operations ===

    /// Request a presigned upload location
    pub async fn create_upload_url(
        &self,
        request: &CreateUploadUrlRequest,
        profile: Option<&Profile>,
    ) -> RpcResult<CreateUploadUrlResponse> {
        self.call(Operation::CreateUploadUrl, request, profile).await
    }

    /// Transfer artifact bytes to a presigned location
    pub async fn transfer_bytes(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content: Vec<u8>,
    ) -> RpcResult<()> {
        self.transport.put_artifact(url, headers, content).await?;
        Ok(())
    }

    /// Create a fix job
    ///
    /// Never retried: a lost response could otherwise create a second job.
    pub async fn start_fix_job(
        &self,
        request: &StartFixJobRequest,
        profile: Option<&Profile>,
    ) -> RpcResult<StartFixJobResponse> {
        self.call(Operation::StartFixJob, request, profile).await
    }

    /// Query the status of a fix job
    pub async fn get_fix_job(
        &self,
        job_id: &str,
        profile: Option<&Profile>,
    ) -> RpcResult<GetFixJobResponse> {
        let request = GetFixJobRequest {
            job_id: job_id.to_string(),
        };
        self.call(Operation::GetFixJob, &request, profile).await
    }

    /// Retrieve the result of a fix job
    pub async fn get_fix_result(
        &self,
        job_id: &str,
        profile: Option<&Profile>,
    ) -> RpcResult<GetFixResultResponse> {
        let request = GetFixResultRequest {
            job_id: job_id.to_string(),
        };
        self.call(Operation::GetFixResult, &request, profile).await
    }

    // === Internal Helpers ===

    async fn call<Req, Resp>(
        &self,
        op: Operation,
        payload: &Req,
        profile: Option<&Profile>,
    ) -> RpcResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload).map_err(TransportError::from)?;
        let request = RpcRequest {
            protocol_version: PROTOCOL_VERSION,
            op,
            request_id: self.next_request_id(),
            profile: profile.cloned(),
            payload,
        };

        let response = self.execute_with_throttle_retry(&request).await?;
        let payload = response
            .payload
            .ok_or_else(|| RpcError::Protocol(format!("{} response missing payload", op)))?;

        serde_json::from_value(payload)
            .map_err(|e| RpcError::Protocol(format!("invalid {} response: {}", op, e)))
    }

    /// Execute a request, retrying THROTTLED answers for idempotent operations
    async fn execute_with_throttle_retry(&self, request: &RpcRequest) -> RpcResult<RpcResponse> {
        let mut attempt = 0;

        loop {
            let response = self.transport.execute(request).await?;

            if response.ok {
                return Ok(response);
            }

            let error = response.error.unwrap_or_else(|| {
                ServiceError::new(ErrorCode::Internal, "error response without details")
            });

            if error.code == ErrorCode::Throttled
                && request.op.is_idempotent()
                && attempt < self.config.throttle_retries
            {
                attempt += 1;
                let retry_after_ms = error
                    .data
                    .as_ref()
                    .and_then(|d| d.get("retry_after_seconds"))
                    .and_then(|v| v.as_u64())
                    .map(|s| s * 1000);
                let delay = retry_after_ms
                    .unwrap_or_else(|| self.calculate_backoff(attempt))
                    .min(self.config.retry_max_delay_ms);

                tracing::debug!(
                    op = %request.op,
                    attempt,
                    delay_ms = delay,
                    "service throttled request, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            return Err(RpcError::from_service(error));
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff(&self, attempt: u32) -> u64 {
        let base = self.config.retry_initial_delay_ms;
        let delay = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        delay.min(self.config.retry_max_delay_ms)
    }
}
