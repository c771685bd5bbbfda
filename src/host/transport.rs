//! Transport Layer for the service client
//!
//! Abstracts the network for testability. Provides:
//! - Transport trait: envelope exchange plus artifact transfer
//! - MockTransport: in-process mock service for tests
//! - HttpTransport: JSON-over-HTTPS for production

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use codefix_protocol::{RpcRequest, RpcResponse, OPERATION_HEADER};

use crate::mock::MockService;

/// Transport trait for service communication
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request envelope and return the response envelope
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Transfer artifact bytes to a presigned location
    async fn put_artifact(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content: Vec<u8>,
    ) -> Result<(), TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = e.status() {
            TransportError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            TransportError::ConnectionFailed(e.to_string())
        }
    }
}

/// Mock transport for testing - drives a MockService in-process
#[derive(Clone, Default)]
pub struct MockTransport {
    service: MockService,
}

impl MockTransport {
    /// Create a new mock transport with a fresh mock service
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport with a pre-configured service
    pub fn with_service(service: MockService) -> Self {
        Self { service }
    }

    /// Get a reference to the underlying mock service for test configuration
    pub fn service(&self) -> &MockService {
        &self.service
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        Ok(self.service.handle_request(request))
    }

    async fn put_artifact(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
        content: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.service.receive_upload(url, &content)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Service endpoint receiving request envelopes
    pub endpoint: String,
    /// Bearer token, if the service requires one
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("codefix/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP transport for production use
///
/// Each envelope is POSTed as JSON to the endpoint with the operation name
/// in a header. Artifacts are PUT directly to the presigned URL.
pub struct HttpTransport {
    config: HttpConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header(OPERATION_HEADER, request.op.as_str())
            .json(request);
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Error envelopes may arrive with a non-2xx status; prefer the envelope.
        match serde_json::from_slice::<RpcResponse>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(TransportError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(e) => Err(TransportError::Serialization(e)),
        }
    }

    async fn put_artifact(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content: Vec<u8>,
    ) -> Result<(), TransportError> {
        let mut builder = self.client.put(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(content).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codefix_protocol::{ErrorCode, Operation, ServiceError, PROTOCOL_VERSION};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one HTTP exchange on localhost, returning the endpoint and the raw request
    async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/rpc", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let head = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8_lossy(&raw).into_owned()
        });

        (endpoint, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    /// Transport that talks to loopback directly, whatever proxy the environment sets
    fn http_transport(endpoint: String, token: Option<&str>) -> HttpTransport {
        let config = HttpConfig {
            endpoint,
            token: token.map(str::to_string),
            request_timeout: Duration::from_secs(5),
            ..HttpConfig::default()
        };
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .no_proxy()
            .build()
            .unwrap();
        HttpTransport { config, client }
    }

    fn make_request(op: Operation, payload: serde_json::Value) -> RpcRequest {
        RpcRequest {
            protocol_version: codefix_protocol::PROTOCOL_VERSION,
            op,
            request_id: "test-001".to_string(),
            profile: None,
            payload,
        }
    }

    #[tokio::test]
    async fn test_mock_transport_execute() {
        let transport = MockTransport::new();
        let request = make_request(Operation::GetFixJob, json!({"job_id": "missing"}));

        let response = transport.execute(&request).await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, ErrorCode::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_mock_transport_shares_service() {
        let service = MockService::new();
        let transport = MockTransport::with_service(service.clone());

        let request = make_request(Operation::GetFixJob, json!({"job_id": "x"}));
        transport.execute(&request).await.unwrap();

        assert_eq!(service.calls(Operation::GetFixJob), 1);
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("codefix/"));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_http_transport_builds() {
        let transport = HttpTransport::new(HttpConfig {
            endpoint: "https://codefix.example.test/rpc".to_string(),
            ..HttpConfig::default()
        })
        .unwrap();
        assert_eq!(transport.endpoint(), "https://codefix.example.test/rpc");
    }

    #[tokio::test]
    async fn test_http_error_envelope_wins_over_status() {
        let envelope = RpcResponse::error(
            PROTOCOL_VERSION,
            "test-001".to_string(),
            ServiceError::new(ErrorCode::ResourceNotFound, "no such job"),
        );
        let (endpoint, server) =
            serve_once("404 Not Found", serde_json::to_vec(&envelope).unwrap()).await;

        let transport = http_transport(endpoint, Some("secret-token"));
        let request = make_request(Operation::GetFixJob, json!({"job_id": "missing"}));
        let response = transport.execute(&request).await.unwrap();

        assert!(!response.ok);
        assert_eq!(response.request_id, "test-001");
        assert_eq!(response.error.unwrap().code, ErrorCode::ResourceNotFound);

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("post /rpc "));
        assert!(raw.contains(&format!("{}: get_fix_job\r\n", OPERATION_HEADER)));
        assert!(raw.contains("authorization: bearer secret-token\r\n"));
        assert!(raw.contains("\"job_id\":\"missing\""));
    }

    #[tokio::test]
    async fn test_http_success_envelope() {
        let envelope = RpcResponse::success(
            PROTOCOL_VERSION,
            "test-001".to_string(),
            json!({"job_id": "job-7", "status": "IN_PROGRESS"}),
        );
        let (endpoint, server) =
            serve_once("200 OK", serde_json::to_vec(&envelope).unwrap()).await;

        let transport = http_transport(endpoint, None);
        let request = make_request(Operation::GetFixJob, json!({"job_id": "job-7"}));
        let response = transport.execute(&request).await.unwrap();

        assert!(response.ok);
        assert_eq!(response.payload.unwrap()["job_id"], "job-7");

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(!raw.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_http_status_without_envelope() {
        let (endpoint, server) = serve_once("502 Bad Gateway", b"upstream down".to_vec()).await;

        let transport = http_transport(endpoint, None);
        let request = make_request(Operation::GetFixJob, json!({"job_id": "job-7"}));
        let err = transport.execute(&request).await.unwrap_err();

        match err {
            TransportError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_success_status_with_garbage_body() {
        let (endpoint, server) = serve_once("200 OK", b"<html></html>".to_vec()).await;

        let transport = http_transport(endpoint, None);
        let request = make_request(Operation::GetFixJob, json!({"job_id": "job-7"}));
        let err = transport.execute(&request).await.unwrap_err();

        assert!(matches!(err, TransportError::Serialization(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_put_artifact_sends_headers() {
        let (endpoint, server) = serve_once("200 OK", Vec::new()).await;
        let transport = http_transport("http://unused.invalid/rpc".to_string(), Some("t"));

        let mut headers = BTreeMap::new();
        headers.insert("x-amz-checksum-sha256".to_string(), "abc123".to_string());
        transport
            .put_artifact(&endpoint, &headers, b"tarbytes".to_vec())
            .await
            .unwrap();

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("put /rpc "));
        assert!(raw.contains("x-amz-checksum-sha256: abc123\r\n"));
        assert!(raw.ends_with("tarbytes"));
    }

    #[tokio::test]
    async fn test_http_put_artifact_rejected() {
        let (endpoint, server) = serve_once("403 Forbidden", b"expired".to_vec()).await;
        let transport = http_transport("http://unused.invalid/rpc".to_string(), None);

        let err = transport
            .put_artifact(&endpoint, &BTreeMap::new(), b"tarbytes".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Http { status: 403, .. }));
        server.await.unwrap();
    }
}
