//! Run summary (run_summary.json)

use chrono::{DateTime, Utc};
use codefix_protocol::ops::SuggestedFix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::FailureKind;
use crate::fetch::FixMetrics;
use crate::pipeline::RunReport;
use crate::state::{RunState, Transition};

/// Schema version for run_summary.json
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_summary.json
pub const RUN_SUMMARY_SCHEMA_ID: &str = "codefix/run_summary@1";

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    Cancelled,
}

/// Run summary (run_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier
    pub run_id: String,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    /// Aggregated status
    pub status: Status,

    /// Process exit code
    pub exit_code: i32,

    /// Remote job id, if one was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// State the run was in when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_state: Option<RunState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FixMetrics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,

    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,

    /// Every state the run entered
    pub history: Vec<Transition>,
}

impl RunSummary {
    /// Summarize a finished run
    pub fn from_report(report: &RunReport) -> Self {
        let run = &report.run;
        let mut summary = Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id: run.run_id.clone(),
            created_at: Utc::now(),
            status: Status::Success,
            exit_code: 0,
            job_id: run.job_id().map(str::to_string),
            failure_kind: None,
            failure_state: None,
            reason: None,
            metrics: None,
            suggested_fix: None,
            duration_ms: run.elapsed_ms(),
            human_summary: String::new(),
            history: run.history().to_vec(),
        };

        match &report.result {
            Ok(outcome) => {
                summary.metrics = outcome.metrics;
                summary.suggested_fix = Some(outcome.suggested_fix.clone());
                summary.human_summary = match outcome.metrics {
                    Some(m) => format!(
                        "Fix ready from job {}: {} line(s) changed",
                        outcome.job_id, m.lines_changed
                    ),
                    None => format!("Fix ready from job {}", outcome.job_id),
                };
            }
            Err(failure) => {
                let kind = failure.kind();
                summary.status = if kind == FailureKind::Cancelled {
                    Status::Cancelled
                } else {
                    Status::Failed
                };
                summary.exit_code = failure.exit_code();
                summary.failure_kind = Some(kind);
                summary.failure_state = Some(failure.state);
                summary.reason = Some(failure.error.to_string());
                summary.human_summary = match summary.status {
                    Status::Cancelled => format!("Run cancelled during {}", failure.state),
                    _ => format!("{} during {}", kind.description(), failure.state),
                };
            }
        }

        summary
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FixError, RunFailure};
    use crate::pipeline::FixOutcome;
    use crate::state::FixRun;

    fn finished_run(error: Option<&FixError>, job_id: Option<&str>) -> FixRun {
        let mut run = FixRun::new("run-123".to_string());
        if let Some(id) = job_id {
            run.record_job(id);
        }
        run.finish(error);
        run
    }

    #[test]
    fn test_success_summary() {
        let fix = SuggestedFix {
            code_diff: "--- a\n+++ b\n-x\n+y\n".to_string(),
            description: None,
            references: Vec::new(),
        };
        let report = RunReport {
            run: finished_run(None, Some("job-123")),
            result: Ok(FixOutcome {
                metrics: FixMetrics::from_diff(&fix.code_diff),
                suggested_fix: fix,
                job_id: "job-123".to_string(),
            }),
        };

        let summary = RunSummary::from_report(&report);
        assert_eq!(summary.status, Status::Success);
        assert_eq!(summary.exit_code, 0);
        assert_eq!(summary.job_id.as_deref(), Some("job-123"));
        assert_eq!(summary.human_summary, "Fix ready from job job-123: 2 line(s) changed");
        assert!(summary.failure_kind.is_none());
    }

    #[test]
    fn test_failure_summary() {
        let error = FixError::ResultFetchFailed {
            job_id: "job-9".to_string(),
            reason: "no suggested fix".to_string(),
        };
        let run = finished_run(Some(&error), Some("job-9"));
        let report = RunReport {
            run,
            result: Err(RunFailure {
                state: RunState::Polling,
                job_id: Some("job-9".to_string()),
                error,
            }),
        };

        let summary = RunSummary::from_report(&report);
        assert_eq!(summary.status, Status::Failed);
        assert_eq!(summary.exit_code, 60);
        assert_eq!(summary.failure_kind, Some(FailureKind::ResultFetch));
        assert_eq!(summary.failure_state, Some(RunState::Polling));
        assert!(summary.suggested_fix.is_none());
    }

    #[test]
    fn test_cancelled_summary_json() {
        let error = FixError::Cancelled;
        let run = finished_run(Some(&error), None);
        let report = RunReport {
            run,
            result: Err(RunFailure {
                state: RunState::NotStarted,
                job_id: None,
                error,
            }),
        };

        let summary = RunSummary::from_report(&report);
        assert_eq!(summary.exit_code, 80);

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"status\": \"cancelled\""));
        assert!(json.contains("\"failure_kind\": \"CANCELLED\""));
        assert!(!json.contains("job_id"));

        let parsed = RunSummary::from_json(&json).unwrap();
        assert_eq!(parsed.status, Status::Cancelled);
        assert_eq!(parsed.history.len(), 2);
    }
}
