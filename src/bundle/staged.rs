//! Staged archive guard

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A packaged artifact on local temporary storage
///
/// The file is owned by the run that created it. `remove()` may be called
/// any number of times; if it never ran, dropping the guard deletes the file.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    sha256: String,
    size: u64,
    removed: bool,
}

impl StagedArtifact {
    pub(crate) fn new(path: PathBuf, sha256: String, size: u64) -> Self {
        Self {
            path,
            sha256,
            size,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 of the archive bytes (lowercase hex)
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the archive into memory
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the staged file
    ///
    /// A file that is already gone counts as removed.
    pub fn remove(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.removed = true;
        tracing::debug!(artifact = %self.path.display(), "removed staged artifact");
        Ok(())
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!(
                artifact = %self.path.display(),
                error = %e,
                "failed to remove staged artifact"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staged(dir: &TempDir) -> StagedArtifact {
        let path = dir.path().join("codefix-test.tar");
        fs::write(&path, b"archive").unwrap();
        StagedArtifact::new(path, "00".repeat(32), 7)
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut artifact = staged(&dir);
        let path = artifact.path().to_path_buf();

        artifact.remove().unwrap();
        artifact.remove().unwrap();

        assert!(artifact.is_removed());
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_deletes_file() {
        let dir = TempDir::new().unwrap();
        let artifact = staged(&dir);
        let path = artifact.path().to_path_buf();

        drop(artifact);

        assert!(!path.exists());
    }

    #[test]
    fn test_already_missing_counts_as_removed() {
        let dir = TempDir::new().unwrap();
        let mut artifact = staged(&dir);
        fs::remove_file(artifact.path()).unwrap();

        artifact.remove().unwrap();
        assert!(artifact.is_removed());
    }
}
