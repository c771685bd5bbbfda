//! Artifact upload
//!
//! Obtains a presigned location, transfers the staged archive to it, and
//! deletes the local copy before returning, whatever the outcome.

use codefix_protocol::ops::{ArtifactType, CreateUploadUrlRequest, UploadContext, UploadIntent};
use codefix_protocol::Profile;

use crate::bundle::StagedArtifact;
use crate::cancel::CancelToken;
use crate::error::FixError;
use crate::host::{RpcError, ServiceClient, TransportError};

/// Handle to an uploaded artifact
///
/// Consumed by job creation; holds no local resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub artifact_type: ArtifactType,
    pub upload_id: String,
}

/// Upload a staged artifact
///
/// The artifact is removed before this returns on every path, including
/// cancellation and transfer failure.
pub async fn upload_artifact(
    client: &ServiceClient,
    mut artifact: StagedArtifact,
    fix_name: &str,
    profile: Option<&Profile>,
    token: &CancelToken,
) -> Result<ArtifactReference, FixError> {
    let result = transfer(client, &artifact, fix_name, profile, token).await;

    if let Err(e) = artifact.remove() {
        // Drop retries the delete; the upload outcome stands.
        tracing::warn!(
            artifact = %artifact.path().display(),
            error = %e,
            "failed to remove staged artifact after upload"
        );
    }

    result
}

async fn transfer(
    client: &ServiceClient,
    artifact: &StagedArtifact,
    fix_name: &str,
    profile: Option<&Profile>,
    token: &CancelToken,
) -> Result<ArtifactReference, FixError> {
    token.check()?;
    let request = CreateUploadUrlRequest {
        content_sha256: artifact.sha256().to_string(),
        content_length: artifact.size(),
        artifact_type: ArtifactType::SourceCode,
        upload_intent: UploadIntent::CodeFixGeneration,
        upload_context: UploadContext {
            fix_name: fix_name.to_string(),
        },
    };
    let location = client
        .create_upload_url(&request, profile)
        .await
        .map_err(FixError::UploadFailed)?;

    token.check()?;
    let content = artifact
        .read()
        .await
        .map_err(|e| FixError::UploadFailed(RpcError::Transport(TransportError::Io(e))))?;
    client
        .transfer_bytes(&location.upload_url, &location.request_headers, content)
        .await
        .map_err(FixError::UploadFailed)?;

    tracing::debug!(
        upload_id = %location.upload_id,
        size = artifact.size(),
        "artifact uploaded"
    );

    Ok(ArtifactReference {
        artifact_type: ArtifactType::SourceCode,
        upload_id: location.upload_id,
    })
}
