//! Failure taxonomy and stable exit codes
//!
//! Every stage surfaces its own `FixError` kind; the orchestrator wraps the
//! first one it sees in a `RunFailure` that also records where the run was
//! and which remote job (if any) it had created.

use serde::{Deserialize, Serialize};

use crate::bundle::BundleError;
use crate::host::RpcError;
use crate::state::RunState;

/// Exit code for invalid usage or configuration
pub const EXIT_CODE_USAGE: i32 = 2;

/// Errors raised by the stages of a fix run
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("packaging failed: {0}")]
    PackagingFailed(#[from] BundleError),

    #[error("artifact upload failed: {0}")]
    UploadFailed(#[source] RpcError),

    #[error("job creation failed: {reason}")]
    JobCreationFailed {
        job_id: Option<String>,
        reason: String,
    },

    #[error("job {job_id} not finished after {attempts} status queries ({elapsed_ms} ms)")]
    PollingTimeout {
        job_id: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    #[error("job {job_id} failed: {reason}")]
    PollingServiceFailed { job_id: String, reason: String },

    #[error("fix result for job {job_id} unavailable: {reason}")]
    ResultFetchFailed { job_id: String, reason: String },
}

impl FixError {
    /// Classify the error for exit codes and telemetry
    pub fn kind(&self) -> FailureKind {
        match self {
            FixError::Cancelled => FailureKind::Cancelled,
            FixError::PackagingFailed(_) => FailureKind::Packaging,
            FixError::UploadFailed(_) => FailureKind::Upload,
            FixError::JobCreationFailed { .. } => FailureKind::JobCreation,
            FixError::PollingTimeout { .. } => FailureKind::PollingTimeout,
            FixError::PollingServiceFailed { .. } => FailureKind::PollingServiceFailed,
            FixError::ResultFetchFailed { .. } => FailureKind::ResultFetch,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FixError::Cancelled)
    }

    /// Remote job id carried by the error, if the job had been created
    pub fn job_id(&self) -> Option<&str> {
        match self {
            FixError::JobCreationFailed { job_id, .. } => job_id.as_deref(),
            FixError::PollingTimeout { job_id, .. }
            | FixError::PollingServiceFailed { job_id, .. }
            | FixError::ResultFetchFailed { job_id, .. } => Some(job_id.as_str()),
            _ => None,
        }
    }
}

/// Failure kind - categorizes the cause of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Cancelled,
    Packaging,
    Upload,
    JobCreation,
    PollingTimeout,
    PollingServiceFailed,
    ResultFetch,
}

impl FailureKind {
    /// Get the stable exit code for this failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Packaging => 10,
            FailureKind::Upload => 20,
            FailureKind::JobCreation => 30,
            FailureKind::PollingTimeout => 40,
            FailureKind::PollingServiceFailed => 50,
            FailureKind::ResultFetch => 60,
            FailureKind::Cancelled => 80,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Cancelled => "Fix generation cancelled",
            FailureKind::Packaging => "Source packaging failed",
            FailureKind::Upload => "Artifact upload failed",
            FailureKind::JobCreation => "Fix job could not be created",
            FailureKind::PollingTimeout => "Fix job did not finish in time",
            FailureKind::PollingServiceFailed => "Fix job failed",
            FailureKind::ResultFetch => "Fix result could not be retrieved",
        }
    }
}

/// Terminal failure of an orchestration run
#[derive(Debug, thiserror::Error)]
#[error("{error} (state: {state}, job: {})", .job_id.as_deref().unwrap_or("none"))]
pub struct RunFailure {
    /// State the run was in when the failure happened
    pub state: RunState,
    /// Remote job id, retained once obtained
    pub job_id: Option<String>,
    /// Underlying cause
    #[source]
    pub error: FixError,
}

impl RunFailure {
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}
