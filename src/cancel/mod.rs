//! Cooperative cancellation for a single fix run
//!
//! A `CancelToken` is shared by clone between the run and whoever may
//! interrupt it (CLI signal handler, editor action). Components call
//! `check()` before every blocking call; in-flight requests are never
//! aborted, the next suspension point observes the signal and unwinds.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::FixError;

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit user action
    User,
    /// SIGINT/SIGTERM received by the CLI
    Signal,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::User => "USER",
            CancelReason::Signal => "SIGNAL",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation on behalf of the user
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::User);
    }

    /// Request cancellation with an explicit reason
    ///
    /// Only the first reason is kept; later calls are no-ops.
    pub fn cancel_with(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.inner.cancel();
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// The reason recorded by the first cancel request
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Fail with `FixError::Cancelled` if cancellation was requested
    pub fn check(&self) -> Result<(), FixError> {
        if self.is_cancelled() {
            return Err(FixError::Cancelled);
        }
        Ok(())
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}
