//! Job status polling
//!
//! Queries the job until it reaches a terminal status. Between queries the
//! poller waits on a bounded exponential backoff; the wait wakes early on
//! cancellation, which the next check then observes. Both an attempt budget
//! and a wall-clock budget bound the loop.

use std::time::Duration;

use codefix_protocol::ops::JobStatus;
use codefix_protocol::Profile;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::FixError;
use crate::host::ServiceClient;

/// Largest accepted backoff factor
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Backoff and budget for status polling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Wait after the first non-terminal status
    pub interval: Duration,
    /// Upper bound for the wait
    pub max_interval: Duration,
    /// Growth factor applied after every wait
    pub backoff_factor: f64,
    /// Maximum number of status queries
    pub max_attempts: u32,
    /// Maximum wall-clock time spent polling
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(5000),
            backoff_factor: 1.5,
            max_attempts: 300,
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll policy validation errors
#[derive(Debug, thiserror::Error)]
pub enum PollPolicyError {
    #[error("interval_ms must be greater than 0")]
    ZeroInterval,

    #[error("max_interval_ms ({max_ms}) must be >= interval_ms ({interval_ms})")]
    MaxBelowInterval { interval_ms: u64, max_ms: u64 },

    #[error("backoff_factor must be in [1.0, 10.0], got {0}")]
    InvalidFactor(f64),

    #[error("max_attempts must be greater than 0")]
    ZeroAttempts,

    #[error("timeout_seconds must be in (0, 86400], got {0}")]
    TimeoutOutOfBounds(u64),
}

impl PollPolicy {
    /// Fixed interval, no growth
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PollPolicyError> {
        if self.interval.is_zero() {
            return Err(PollPolicyError::ZeroInterval);
        }
        if self.max_interval < self.interval {
            return Err(PollPolicyError::MaxBelowInterval {
                interval_ms: self.interval.as_millis() as u64,
                max_ms: self.max_interval.as_millis() as u64,
            });
        }
        if !(1.0..=MAX_BACKOFF_FACTOR).contains(&self.backoff_factor) {
            return Err(PollPolicyError::InvalidFactor(self.backoff_factor));
        }
        if self.max_attempts == 0 {
            return Err(PollPolicyError::ZeroAttempts);
        }
        let secs = self.timeout.as_secs();
        if secs == 0 || secs > 86400 {
            return Err(PollPolicyError::TimeoutOutOfBounds(secs));
        }
        Ok(())
    }

    /// Wait following `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Attempt and wall-clock accounting for one polling loop
#[derive(Debug)]
struct PollBudget {
    max_attempts: u32,
    timeout: Duration,
    started: Instant,
    attempts: u32,
}

impl PollBudget {
    fn start(policy: &PollPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            timeout: policy.timeout,
            started: Instant::now(),
            attempts: 0,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts || self.elapsed() >= self.timeout
    }
}

/// Poll a job until it reaches a terminal status
///
/// Returns the terminal status; what FAILED means is up to the caller.
pub async fn poll_job(
    client: &ServiceClient,
    job_id: &str,
    profile: Option<&Profile>,
    policy: &PollPolicy,
    token: &CancelToken,
) -> Result<JobStatus, FixError> {
    let mut budget = PollBudget::start(policy);
    let mut interval = policy.interval;

    loop {
        token.check()?;

        if budget.is_exhausted() {
            return Err(FixError::PollingTimeout {
                job_id: job_id.to_string(),
                attempts: budget.attempts,
                elapsed_ms: budget.elapsed().as_millis() as u64,
            });
        }

        budget.attempts += 1;
        let response = client.get_fix_job(job_id, profile).await.map_err(|e| {
            FixError::PollingServiceFailed {
                job_id: job_id.to_string(),
                reason: format!("status query failed: {}", e),
            }
        })?;

        tracing::debug!(
            job_id,
            attempt = budget.attempts,
            status = ?response.status,
            "job status"
        );

        if response.status.is_terminal() {
            return Ok(response.status);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = token.cancelled() => {}
        }
        interval = policy.next_interval(interval);
    }
}
