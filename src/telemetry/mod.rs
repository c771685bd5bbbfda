//! Run telemetry
//!
//! One `FixJobEvent` per orchestration run, emitted at exit. Sinks never
//! fail: errors are logged and swallowed so telemetry cannot change a run's
//! outcome.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;
use crate::state::RunState;

/// Event describing the end of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixJobEvent {
    pub run_id: String,
    /// Remote job id, if job creation got that far
    pub job_id: Option<String>,
    pub language: String,
    pub rule_id: String,
    pub detector_id: String,
    /// Terminal run state
    pub result: RunState,
    /// Failure classification, for failed and cancelled runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_changed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chars_changed: Option<u32>,
    pub duration_ms: u64,
}

/// Receiver of run events
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &FixJobEvent);
}

/// Logs events as structured `tracing` records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: &FixJobEvent) {
        tracing::info!(
            target: "codefix::telemetry",
            run_id = %event.run_id,
            job_id = event.job_id.as_deref().unwrap_or("none"),
            language = %event.language,
            rule_id = %event.rule_id,
            detector_id = %event.detector_id,
            result = %event.result,
            failure = ?event.failure,
            lines_changed = ?event.lines_changed,
            chars_changed = ?event.chars_changed,
            duration_ms = event.duration_ms,
            "codefix run finished"
        );
    }
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonLinesTelemetry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesTelemetry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append(&self, event: &FixJobEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl TelemetrySink for JsonLinesTelemetry {
    fn emit(&self, event: &FixJobEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to write telemetry event"
            );
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    events: Arc<Mutex<Vec<FixJobEvent>>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<FixJobEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn emit(&self, event: &FixJobEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
