//! Failure Injection for the Mock Service
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;

use codefix_protocol::{ErrorCode, Operation, ServiceError};

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error envelope to return
    pub error: ServiceError,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ServiceError::new(code, message),
            fail_count: None,
        }
    }

    /// Create a THROTTLED error with retry-after
    pub fn throttled(retry_after_seconds: u32) -> Self {
        Self {
            error: ServiceError::throttled(retry_after_seconds),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-operation failure configs
    configs: HashMap<Operation, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<Operation, u32>,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Inject an error for an operation
    pub fn inject_error(&mut self, op: Operation, code: ErrorCode, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(code, message));
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Check if a failure should occur for an operation
    /// Returns the error to send if one should occur, None otherwise
    pub fn check(&mut self, op: Operation) -> Option<ServiceError> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.error.clone())
    }
}
