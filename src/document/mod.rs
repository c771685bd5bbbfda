//! Document flush collaborator
//!
//! Before packaging, on-disk content must match whatever the editor holds in
//! memory. Editor integrations implement `DocumentFlusher`; the CLI uses
//! `OnDiskDocuments`, which only verifies the file is there.

use async_trait::async_trait;
use std::path::Path;

use crate::bundle::BundleError;

#[async_trait]
pub trait DocumentFlusher: Send + Sync {
    /// Persist pending edits for `path`
    async fn flush(&self, path: &Path) -> Result<(), BundleError>;
}

/// Flusher for files with no in-memory edits
#[derive(Debug, Clone, Copy, Default)]
pub struct OnDiskDocuments;

#[async_trait]
impl DocumentFlusher for OnDiskDocuments {
    async fn flush(&self, path: &Path) -> Result<(), BundleError> {
        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| BundleError::SourceUnavailable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        if !metadata.is_file() {
            return Err(BundleError::NotAFile(path.to_path_buf()));
        }
        Ok(())
    }
}
