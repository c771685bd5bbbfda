//! Upload location types.
//!
//! The service hands out a presigned, time-limited location; artifact bytes
//! are then transferred directly to it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of artifact being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    /// Packaged source code.
    SourceCode,
}

/// Why the artifact is being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadIntent {
    CodeFixGeneration,
}

/// Extra context recorded alongside the upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadContext {
    /// Human-readable name of the fix being generated.
    pub fix_name: String,
}

/// create_upload_url request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUploadUrlRequest {
    /// SHA-256 hex digest of the artifact bytes.
    pub content_sha256: String,
    /// Artifact size in bytes.
    pub content_length: u64,
    /// Artifact kind.
    pub artifact_type: ArtifactType,
    /// Upload intent.
    pub upload_intent: UploadIntent,
    /// Upload context.
    pub upload_context: UploadContext,
}

/// create_upload_url response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUploadUrlResponse {
    /// Identifier that later requests use to reference the upload.
    pub upload_id: String,
    /// Presigned destination for the artifact bytes.
    pub upload_url: String,
    /// Headers that must accompany the transfer.
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,
    /// When the presigned location stops accepting data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}
