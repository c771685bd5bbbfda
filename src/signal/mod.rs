//! Interrupt handling (SIGINT/SIGTERM)
//!
//! On the first interrupt the run's cancel token is cancelled; the
//! orchestrator observes it at its next check, cleans up, emits telemetry
//! and the CLI exits with the cancelled code. A second interrupt exits
//! immediately with the same code.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cancel::{CancelReason, CancelToken};
use crate::error::FailureKind;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        match self.signal_count.fetch_add(1, Ordering::SeqCst) {
            0 => SignalAction::InitiateCancellation,
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: cancel the run
    InitiateCancellation,
    /// Second signal: exit without waiting for cleanup
    ImmediateExit,
    /// Third+ signal
    Ignore,
}

/// Connects process interrupts to a run's cancel token
pub struct SignalHandler {
    state: Arc<SignalState>,
    token: CancelToken,
}

impl SignalHandler {
    pub fn new(token: CancelToken) -> Self {
        Self {
            state: Arc::new(SignalState::new()),
            token,
        }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Apply a signal to the token; returns the action taken
    pub fn dispatch(&self) -> SignalAction {
        let action = self.state.handle_signal();
        if action == SignalAction::InitiateCancellation {
            self.token.cancel_with(CancelReason::Signal);
        }
        action
    }

    /// Install the process-wide handler
    ///
    /// Must be called at most once per process.
    pub fn install(self) -> Result<(), ctrlc::Error> {
        ctrlc::set_handler(move || match self.dispatch() {
            SignalAction::InitiateCancellation => {
                warn!("received interrupt, cancelling run");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(FailureKind::Cancelled.exit_code());
            }
            SignalAction::Ignore => {}
        })
    }
}
