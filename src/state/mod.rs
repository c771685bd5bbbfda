//! Orchestration state for a single fix run
//!
//! States: NOT_STARTED → PACKAGING → UPLOADING → JOB_CREATED → POLLING
//! → {SUCCEEDED | FAILED | CANCELLED}
//!
//! State is owned by the run; nothing here is process-wide.

mod run_state;

pub use run_state::{FixRun, RunState, Transition};

/// Check if a state is terminal (no further transitions possible)
pub trait TerminalState {
    fn is_terminal(&self) -> bool;
}

/// Generate a new run identifier
///
/// ULIDs sort by creation time and are unique per run, so they double as
/// collision-free staging file names under concurrent runs.
pub fn new_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
