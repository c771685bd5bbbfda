//! Fix orchestration
//!
//! Sequences one run through packaging, upload, job creation, polling and
//! result retrieval:
//!
//! NOT_STARTED → PACKAGING → UPLOADING → JOB_CREATED → POLLING
//! → {SUCCEEDED | FAILED | CANCELLED}
//!
//! Every transition is preceded by a cancellation check. Whatever happens,
//! the staged artifact is gone, the run is in a terminal state, and exactly
//! one telemetry event has been emitted when `execute` returns.

use std::path::Path;
use std::sync::Arc;

use codefix_protocol::ops::{JobStatus, SuggestedFix};
use codefix_protocol::Profile;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::bundle::{ArtifactPackager, BundleError, StagedArtifact};
use crate::cancel::CancelToken;
use crate::config::CodefixConfig;
use crate::document::{DocumentFlusher, OnDiskDocuments};
use crate::error::{FixError, RunFailure};
use crate::fetch::{fetch_result, FixMetrics};
use crate::host::{ServiceClient, Transport};
use crate::job::{create_job, FixRequest, JobSubmission, ReferencePolicy};
use crate::poll::{poll_job, PollPolicy};
use crate::state::{new_run_id, FixRun, RunState};
use crate::telemetry::{FixJobEvent, TelemetrySink, TracingTelemetry};
use crate::upload::upload_artifact;

/// Successful run result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixOutcome {
    pub suggested_fix: SuggestedFix,
    pub job_id: String,
    /// Best-effort size of the fix
    pub metrics: Option<FixMetrics>,
}

/// Everything known about a finished run
#[derive(Debug)]
pub struct RunReport {
    pub run: FixRun,
    pub result: Result<FixOutcome, RunFailure>,
}

/// Orchestrator for code-fix runs
///
/// Holds only collaborators and policies; all per-run state lives in the
/// `FixRun` created by each call, so one pipeline can serve concurrent runs.
pub struct FixPipeline {
    client: ServiceClient,
    packager: ArtifactPackager,
    documents: Arc<dyn DocumentFlusher>,
    telemetry: Arc<dyn TelemetrySink>,
    poll_policy: PollPolicy,
    reference_policy: ReferencePolicy,
    profile: Option<Profile>,
}

impl FixPipeline {
    pub fn new(client: ServiceClient, packager: ArtifactPackager) -> Self {
        Self {
            client,
            packager,
            documents: Arc::new(OnDiskDocuments),
            telemetry: Arc::new(TracingTelemetry),
            poll_policy: PollPolicy::default(),
            reference_policy: ReferencePolicy::Allow,
            profile: None,
        }
    }

    /// Build a pipeline from configuration over the given transport
    pub fn from_config(config: &CodefixConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(ServiceClient::new(transport), config.packager())
            .with_poll_policy(config.poll_policy())
            .with_reference_policy(config.reference_policy())
            .with_profile(config.profile())
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentFlusher>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    pub fn with_profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = profile;
        self
    }

    /// Run one fix request to completion
    pub async fn run(
        &self,
        request: &FixRequest,
        token: &CancelToken,
    ) -> Result<FixOutcome, RunFailure> {
        self.execute(request, token).await.result
    }

    /// Run one fix request and return the run record alongside the result
    #[instrument(
        name = "codefix_run",
        skip_all,
        fields(
            run_id = tracing::field::Empty,
            file = %request.file.display(),
            start_line = request.start_line,
            end_line = request.end_line,
        )
    )]
    pub async fn execute(&self, request: &FixRequest, token: &CancelToken) -> RunReport {
        let mut run = FixRun::new(new_run_id());
        tracing::Span::current().record("run_id", run.run_id.as_str());

        // Resolved once; every remote call of this run uses the same context.
        let profile = self.profile.clone();

        info!(rule_id = %request.rule_id, "starting code fix run");
        let result = self.drive(&mut run, request, profile.as_ref(), token).await;

        let stage = run.state();
        run.finish(result.as_ref().err());

        let result = match result {
            Ok(fix) => {
                let job_id = run.job_id().unwrap_or_default().to_string();
                info!(job_id = %job_id, "code fix run succeeded");
                Ok(FixOutcome {
                    metrics: FixMetrics::from_diff(&fix.code_diff),
                    suggested_fix: fix,
                    job_id,
                })
            }
            Err(error) => {
                let job_id = run.job_id().map(str::to_string);
                if error.is_cancelled() {
                    warn!(
                        stage = %stage,
                        job_id = job_id.as_deref().unwrap_or("none"),
                        "code fix run cancelled"
                    );
                } else {
                    tracing::error!(
                        stage = %stage,
                        job_id = job_id.as_deref().unwrap_or("none"),
                        file = %request.file.display(),
                        start_line = request.start_line,
                        end_line = request.end_line,
                        error = %error,
                        "code fix run failed"
                    );
                }
                Err(RunFailure {
                    state: stage,
                    job_id,
                    error,
                })
            }
        };

        self.emit_telemetry(&run, request, &result);

        RunReport { run, result }
    }

    async fn drive(
        &self,
        run: &mut FixRun,
        request: &FixRequest,
        profile: Option<&Profile>,
        token: &CancelToken,
    ) -> Result<SuggestedFix, FixError> {
        run.advance(RunState::Packaging, token)?;
        self.documents.flush(&request.file).await?;
        token.check()?;
        let artifact = self.package(&request.file, &run.run_id).await?;

        run.advance(RunState::Uploading, token)?;
        let reference =
            upload_artifact(&self.client, artifact, &request.fix_name, profile, token).await?;

        let submission = JobSubmission::from_request(request, self.reference_policy);
        let job = match create_job(&self.client, reference, &submission, profile, token).await {
            Ok(job) => job,
            Err(e) => {
                if let Some(job_id) = e.job_id() {
                    run.record_job(job_id);
                }
                return Err(e);
            }
        };
        run.record_job(job.job_id.as_str());
        run.advance(RunState::JobCreated, token)?;

        run.advance(RunState::Polling, token)?;
        let status = poll_job(&self.client, &job.job_id, profile, &self.poll_policy, token).await?;
        if status == JobStatus::Failed {
            return Err(FixError::PollingServiceFailed {
                job_id: job.job_id,
                reason: "service reported FAILED".to_string(),
            });
        }

        fetch_result(&self.client, &job.job_id, profile, token).await
    }

    /// Archive the source on the blocking pool
    async fn package(&self, source: &Path, run_id: &str) -> Result<StagedArtifact, FixError> {
        let packager = self.packager.clone();
        let source = source.to_path_buf();
        let run_id = run_id.to_string();

        let staged = tokio::task::spawn_blocking(move || packager.package(&source, &run_id))
            .await
            .map_err(|e| BundleError::TaskFailed(e.to_string()))??;
        Ok(staged)
    }

    fn emit_telemetry(
        &self,
        run: &FixRun,
        request: &FixRequest,
        result: &Result<FixOutcome, RunFailure>,
    ) {
        let (failure, reason, metrics) = match result {
            Ok(outcome) => (None, None, outcome.metrics),
            Err(f) => (Some(f.kind()), Some(f.error.to_string()), None),
        };

        self.telemetry.emit(&FixJobEvent {
            run_id: run.run_id.clone(),
            job_id: run.job_id().map(str::to_string),
            language: request.language.clone(),
            rule_id: request.rule_id.clone(),
            detector_id: request.detector_id.clone(),
            result: run.state(),
            failure,
            reason,
            lines_changed: metrics.map(|m| m.lines_changed),
            chars_changed: metrics.map(|m| m.chars_changed),
            duration_ms: run.elapsed_ms(),
        });
    }
}
