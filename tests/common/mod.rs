//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codefix::bundle::{ArtifactPackager, ARTIFACT_PREFIX};
use codefix::host::{MockTransport, ServiceClient, Transport, TransportError};
use codefix::mock::MockService;
use codefix::telemetry::MemoryTelemetry;
use codefix::{CancelToken, FixPipeline, FixRequest, PollPolicy};
use codefix_protocol::{Operation, RpcRequest, RpcResponse};
use tempfile::TempDir;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source file, staging directory, mock service and telemetry for one test
pub struct Fixture {
    pub source_dir: TempDir,
    pub staging_dir: TempDir,
    pub service: MockService,
    pub telemetry: MemoryTelemetry,
    pub request: FixRequest,
}

impl Fixture {
    pub fn new() -> Self {
        let source_dir = TempDir::new().unwrap();
        let staging_dir = TempDir::new().unwrap();
        let file = source_dir.path().join("handler.py");
        std::fs::write(
            &file,
            "import json\n\ndef handle(data):\n    return eval(data)\n",
        )
        .unwrap();

        Self {
            source_dir,
            staging_dir,
            service: MockService::new(),
            telemetry: MemoryTelemetry::new(),
            request: FixRequest {
                file,
                start_line: 3,
                end_line: 3,
                recommendation: "Do not evaluate untrusted input".to_string(),
                rule_id: "python-eval-injection".to_string(),
                detector_id: "python/eval-injection@v1".to_string(),
                fix_name: "Use ast.literal_eval".to_string(),
                language: "python".to_string(),
            },
        }
    }

    /// Pipeline over the mock service with a fixed poll interval
    pub fn pipeline(&self) -> FixPipeline {
        self.pipeline_with(Arc::new(MockTransport::with_service(self.service.clone())))
    }

    pub fn pipeline_with(&self, transport: Arc<dyn Transport>) -> FixPipeline {
        FixPipeline::new(
            ServiceClient::new(transport),
            ArtifactPackager::new(self.staging_dir.path().to_path_buf()),
        )
        .with_telemetry(Arc::new(self.telemetry.clone()))
        .with_poll_policy(PollPolicy::fixed(POLL_INTERVAL))
    }

    /// Staged artifacts still present
    pub fn staged_files(&self) -> Vec<PathBuf> {
        staged_files(self.staging_dir.path())
    }
}

pub fn staged_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX))
        })
        .collect()
}

/// Transport that cancels a token once a given operation has been served
pub struct CancelAfter {
    inner: MockTransport,
    op: Operation,
    token: CancelToken,
}

impl CancelAfter {
    pub fn new(service: MockService, op: Operation, token: CancelToken) -> Self {
        Self {
            inner: MockTransport::with_service(service),
            op,
            token,
        }
    }
}

#[async_trait]
impl Transport for CancelAfter {
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let response = self.inner.execute(request).await;
        if request.op == self.op {
            self.token.cancel();
        }
        response
    }

    async fn put_artifact(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.inner.put_artifact(url, headers, content).await
    }
}
