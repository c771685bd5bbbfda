//! Cleanup Guarantee Tests
//!
//! The staged artifact never outlives a run, whatever the outcome.

mod common;

use std::sync::Arc;

use codefix::bundle::ArtifactPackager;
use codefix::host::{MockTransport, ServiceClient};
use codefix::{CancelToken, FixPipeline, RunState};
use codefix_protocol::ops::JobStatus;
use codefix_protocol::{ErrorCode, Operation};
use common::{staged_files, CancelAfter, Fixture};

#[tokio::test(start_paused = true)]
async fn test_artifact_removed_after_success() {
    let fx = Fixture::new();

    fx.pipeline()
        .run(&fx.request, &CancelToken::new())
        .await
        .unwrap();

    assert!(fx.staged_files().is_empty());
    let upload = fx.service.last_job().map(|j| j.request.upload_id).unwrap();
    assert!(fx.service.upload(&upload).is_some_and(|u| u.is_complete()));
}

#[tokio::test(start_paused = true)]
async fn test_artifact_removed_after_transfer_failure() {
    let fx = Fixture::new();
    fx.service.fail_transfers(1);

    let result = fx.pipeline().run(&fx.request, &CancelToken::new()).await;

    assert!(result.is_err());
    assert!(fx.staged_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_artifact_removed_after_location_failure() {
    let fx = Fixture::new();
    fx.service
        .inject_error(Operation::CreateUploadUrl, ErrorCode::Internal, "unavailable");

    let result = fx.pipeline().run(&fx.request, &CancelToken::new()).await;

    assert!(result.is_err());
    assert!(fx.staged_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_artifact_removed_after_cancel_mid_upload() {
    let fx = Fixture::new();
    let token = CancelToken::new();
    let transport = CancelAfter::new(fx.service.clone(), Operation::CreateUploadUrl, token.clone());

    let result = fx
        .pipeline_with(Arc::new(transport))
        .run(&fx.request, &token)
        .await;

    assert!(result.unwrap_err().error.is_cancelled());
    assert!(fx.staged_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_artifact_removed_after_polled_failure() {
    let fx = Fixture::new();
    fx.service
        .set_default_script(vec![JobStatus::InProgress, JobStatus::Failed]);

    let report = fx.pipeline().execute(&fx.request, &CancelToken::new()).await;

    assert!(report.result.is_err());
    assert_eq!(report.run.state(), RunState::Failed);
    assert!(fx.staged_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_source_leaves_nothing_staged() {
    let fx = Fixture::new();
    let pipeline = FixPipeline::new(
        ServiceClient::new(Arc::new(MockTransport::with_service(fx.service.clone()))),
        ArtifactPackager::new(fx.staging_dir.path().to_path_buf()).with_max_bytes(16),
    );

    let failure = pipeline
        .run(&fx.request, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.state, RunState::Packaging);
    assert_eq!(fx.service.total_calls(), 0);
    assert!(staged_files(fx.staging_dir.path()).is_empty());
}
