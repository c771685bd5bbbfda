//! Run state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cancel::CancelToken;
use crate::error::FixError;

use super::TerminalState;

/// Run state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Run created, nothing done yet
    NotStarted,
    /// Flushing and archiving the source
    Packaging,
    /// Transferring the artifact and creating the job
    Uploading,
    /// Remote job exists
    JobCreated,
    /// Waiting for the job to reach a terminal status
    Polling,
    /// Fix retrieved
    Succeeded,
    /// A stage failed
    Failed,
    /// Cancellation observed
    Cancelled,
}

impl TerminalState for RunState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Cancelled
        )
    }
}

impl RunState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self, target) {
            (_, RunState::Failed) | (_, RunState::Cancelled) => true,

            (RunState::NotStarted, RunState::Packaging) => true,
            (RunState::Packaging, RunState::Uploading) => true,
            (RunState::Uploading, RunState::JobCreated) => true,
            (RunState::JobCreated, RunState::Polling) => true,
            (RunState::Polling, RunState::Succeeded) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "NOT_STARTED",
            RunState::Packaging => "PACKAGING",
            RunState::Uploading => "UPLOADING",
            RunState::JobCreated => "JOB_CREATED",
            RunState::Polling => "POLLING",
            RunState::Succeeded => "SUCCEEDED",
            RunState::Failed => "FAILED",
            RunState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: RunState,
    pub at: DateTime<Utc>,
}

/// Run-scoped orchestration state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRun {
    /// Run identifier
    pub run_id: String,

    /// Current state
    state: RunState,

    /// Remote job id, kept for the rest of the run once known
    job_id: Option<String>,

    /// When the run was created
    pub created_at: DateTime<Utc>,

    /// Every state entered, in order
    history: Vec<Transition>,
}

impl FixRun {
    /// Create a new run in NOT_STARTED state
    pub fn new(run_id: String) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            state: RunState::NotStarted,
            job_id: None,
            created_at: now,
            history: vec![Transition {
                state: RunState::NotStarted,
                at: now,
            }],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// True between the first stage and a terminal state
    pub fn is_in_progress(&self) -> bool {
        self.state != RunState::NotStarted && !self.state.is_terminal()
    }

    /// Retain the remote job id
    pub fn record_job(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    /// Move to the next forward state after checking for cancellation
    pub fn advance(&mut self, next: RunState, token: &CancelToken) -> Result<(), FixError> {
        token.check()?;
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        self.enter(next);
        Ok(())
    }

    /// Enter the terminal state matching a run outcome
    ///
    /// Returns false if the run already finished.
    pub fn finish(&mut self, error: Option<&FixError>) -> bool {
        let terminal = match error {
            None => RunState::Succeeded,
            Some(e) if e.is_cancelled() => RunState::Cancelled,
            Some(_) => RunState::Failed,
        };

        if !self.state.can_transition_to(terminal) {
            return false;
        }
        self.enter(terminal);
        true
    }

    /// Elapsed wall-clock time since the run was created
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.created_at).num_milliseconds().max(0) as u64
    }

    fn enter(&mut self, state: RunState) {
        self.state = state;
        self.history.push(Transition {
            state,
            at: Utc::now(),
        });
    }
}
