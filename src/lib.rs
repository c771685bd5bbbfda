//! Codefix - remote code-fix job lane
//!
//! Packages a source file, uploads it to a service-issued location, starts a
//! remote fix-generation job for a line range, polls it to completion and
//! retrieves the suggested fix. Every run cleans up its staged artifact,
//! honors cancellation at each stage, and emits exactly one telemetry event.

pub mod bundle;
pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod host;
pub mod job;
pub mod mock;
pub mod pipeline;
pub mod poll;
pub mod signal;
pub mod state;
pub mod summary;
pub mod telemetry;
pub mod upload;

pub use cancel::{CancelReason, CancelToken};
pub use config::{CodefixConfig, EffectiveConfig};
pub use error::{FailureKind, FixError, RunFailure};
pub use job::{FixRequest, ReferencePolicy};
pub use pipeline::{FixOutcome, FixPipeline, RunReport};
pub use poll::PollPolicy;
pub use state::{FixRun, RunState, TerminalState};
pub use summary::RunSummary;
