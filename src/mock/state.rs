//! Mock Service State Management
//!
//! Tracks uploads, jobs, and scripted job progressions.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use codefix_protocol::ops::{JobStatus, StartFixJobRequest, SuggestedFix};

/// An upload location handed out by the service
#[derive(Debug, Clone)]
pub struct Upload {
    pub upload_id: String,
    pub upload_url: String,
    /// Digest the client promised in create_upload_url
    pub expected_sha256: String,
    pub expected_length: u64,
    /// Bytes received on the presigned URL, if any
    pub content: Option<Vec<u8>>,
}

impl Upload {
    pub fn is_complete(&self) -> bool {
        self.content.is_some()
    }
}

/// A job tracked by the mock service
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    /// Request that created the job
    pub request: StartFixJobRequest,
    /// Last status reported
    pub status: JobStatus,
    /// Statuses still to be reported; the last one repeats
    pub script: VecDeque<JobStatus>,
    /// Number of status queries served
    pub status_queries: u32,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Advance the script by one status query
    pub fn next_status(&mut self) -> JobStatus {
        self.status_queries += 1;
        if self.script.len() > 1 {
            if let Some(status) = self.script.pop_front() {
                self.status = status;
            }
        } else if let Some(status) = self.script.front() {
            self.status = *status;
        }
        self.status
    }
}

/// Shared state of the mock service
#[derive(Debug)]
pub struct MockState {
    pub uploads: HashMap<String, Upload>,
    pub jobs: HashMap<String, Job>,
    /// Order in which jobs were created
    pub job_order: Vec<String>,
    /// Id for the next created job; generated when None
    pub next_job_id: Option<String>,
    /// Status returned by start_fix_job
    pub initial_status: JobStatus,
    /// Scripts keyed by job id, consumed on creation
    pub scripts: HashMap<String, Vec<JobStatus>>,
    /// Script for jobs without their own
    pub default_script: Vec<JobStatus>,
    /// Fix served by get_fix_result; None means a missing payload
    pub fix: Option<SuggestedFix>,
    /// Remaining presigned transfers to reject
    pub transfer_failures: u32,
    /// Calls served, per operation name (plus "transfer")
    pub calls: HashMap<String, u32>,
    counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            uploads: HashMap::new(),
            jobs: HashMap::new(),
            job_order: Vec::new(),
            next_job_id: None,
            initial_status: JobStatus::Pending,
            scripts: HashMap::new(),
            default_script: vec![JobStatus::Succeeded],
            fix: Some(default_fix()),
            transfer_failures: 0,
            calls: HashMap::new(),
            counter: 0,
        }
    }
}

impl MockState {
    /// Generate a sequential identifier with the given prefix
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{:04}", prefix, self.counter)
    }

    pub fn record_call(&mut self, name: &str) {
        *self.calls.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Register a job created from `request`
    pub fn create_job(&mut self, request: StartFixJobRequest) -> &Job {
        let job_id = match self.next_job_id.take() {
            Some(id) => id,
            None => self.next_id("job"),
        };
        let script = self
            .scripts
            .remove(&job_id)
            .unwrap_or_else(|| self.default_script.clone());

        let job = Job {
            job_id: job_id.clone(),
            request,
            status: self.initial_status,
            script: script.into(),
            status_queries: 0,
            created_at: Utc::now(),
        };
        self.job_order.push(job_id.clone());
        self.jobs.entry(job_id).or_insert(job)
    }
}

/// Fix returned when a test does not configure one
pub fn default_fix() -> SuggestedFix {
    SuggestedFix {
        code_diff: "--- a/main.py\n+++ b/main.py\n@@ -1 +1 @@\n-eval(data)\n+ast.literal_eval(data)\n"
            .to_string(),
        description: Some("Replace eval with ast.literal_eval".to_string()),
        references: Vec::new(),
    }
}
