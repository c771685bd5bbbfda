//! Source packaging
//!
//! Turns one source file into a single-entry tar archive staged on local
//! temporary storage. Headers are canonical (mtime 0, uid/gid 0, mode 0644)
//! so identical content always yields the same archive digest.

mod staged;

pub use staged::StagedArtifact;

use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

/// File name prefix for staged archives
pub const ARTIFACT_PREFIX: &str = "codefix-";

/// Errors for packaging operations
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Source {path} unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Source is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Path is not within project root: {0}")]
    PathNotInRoot(PathBuf),

    #[error("Artifact size {actual_bytes} exceeds limit {limit_bytes}")]
    SizeExceeded {
        /// The actual archive size in bytes
        actual_bytes: u64,
        /// The configured limit in bytes
        limit_bytes: u64,
    },

    #[error("Packaging task failed: {0}")]
    TaskFailed(String),
}

/// Packager for single-file source artifacts
#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    /// Directory receiving staged archives
    staging_dir: PathBuf,
    /// Project root used to compute the entry path
    root: Option<PathBuf>,
    /// Maximum archive size in bytes (None = no limit)
    max_bytes: Option<u64>,
}

impl ArtifactPackager {
    /// Create a packager staging into the given directory
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            root: None,
            max_bytes: None,
        }
    }

    /// Record entry paths relative to this root
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    /// Set maximum archive size in bytes
    ///
    /// A value of 0 means no limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = if max_bytes > 0 { Some(max_bytes) } else { None };
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Where the archive for a run is staged
    pub fn artifact_path(&self, run_id: &str) -> PathBuf {
        self.staging_dir
            .join(format!("{}{}.tar", ARTIFACT_PREFIX, run_id))
    }

    /// Archive `source` into the staging directory
    ///
    /// Blocking; call from the blocking pool in async contexts.
    pub fn package(&self, source: &Path, run_id: &str) -> Result<StagedArtifact, BundleError> {
        let metadata = fs::metadata(source).map_err(|e| BundleError::SourceUnavailable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(BundleError::NotAFile(source.to_path_buf()));
        }

        let entry_path = self.entry_path(source)?;
        let contents = fs::read(source)?;
        let tar_bytes = build_archive(&entry_path, &contents)?;

        let actual_size = tar_bytes.len() as u64;
        if let Some(limit) = self.max_bytes {
            if actual_size > limit {
                return Err(BundleError::SizeExceeded {
                    actual_bytes: actual_size,
                    limit_bytes: limit,
                });
            }
        }

        let sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(&tar_bytes);
            hex::encode(hasher.finalize())
        };

        let path = self.artifact_path(run_id);
        write_new(&path, &tar_bytes)?;

        tracing::debug!(
            run_id,
            artifact = %path.display(),
            entry = %entry_path,
            size = actual_size,
            "staged source artifact"
        );

        Ok(StagedArtifact::new(path, sha256, actual_size))
    }

    /// Entry name inside the archive
    fn entry_path(&self, source: &Path) -> Result<String, BundleError> {
        let rel = match &self.root {
            Some(root) => source
                .strip_prefix(root)
                .map_err(|_| BundleError::PathNotInRoot(source.to_path_buf()))?
                .to_path_buf(),
            None => source
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| BundleError::NotAFile(source.to_path_buf()))?,
        };
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }
}

fn build_archive(entry_path: &str, contents: &[u8]) -> Result<Vec<u8>, BundleError> {
    let mut tar_buffer = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_buffer);

        let mut header = Header::new_gnu();
        header.set_path(entry_path)?;
        header.set_size(contents.len() as u64);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_cksum();

        builder.append(&header, contents)?;
        builder.finish()?;
    }
    Ok(tar_buffer)
}

/// Create `path` and fill it; a partial file is removed only if this call created it
fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    if written.is_err() {
        drop(file);
        let _ = fs::remove_file(path);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_source(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn entries(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut entry = e.unwrap();
                let path = entry.path().unwrap().to_string_lossy().to_string();
                let mut body = String::new();
                entry.read_to_string(&mut body).unwrap();
                (path, body)
            })
            .collect()
    }

    #[test]
    fn test_single_entry_archive() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = write_source(src.path(), "app.py", "print('hi')\n");

        let packager = ArtifactPackager::new(staging.path().to_path_buf());
        let artifact = packager.package(&source, "run1").unwrap();

        assert_eq!(artifact.path(), staging.path().join("codefix-run1.tar"));
        let bytes = fs::read(artifact.path()).unwrap();
        assert_eq!(
            entries(&bytes),
            vec![("app.py".to_string(), "print('hi')\n".to_string())]
        );
        assert_eq!(artifact.size(), bytes.len() as u64);
    }

    #[test]
    fn test_entry_relative_to_root() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("pkg")).unwrap();
        let source = write_source(&src.path().join("pkg"), "mod.rs", "fn main() {}\n");
        let staging = TempDir::new().unwrap();

        let packager = ArtifactPackager::new(staging.path().to_path_buf())
            .with_root(src.path().to_path_buf());
        let artifact = packager.package(&source, "run2").unwrap();

        let bytes = fs::read(artifact.path()).unwrap();
        assert_eq!(entries(&bytes)[0].0, "pkg/mod.rs");
    }

    #[test]
    fn test_digest_is_deterministic() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = write_source(src.path(), "a.js", "let x = 1;\n");
        let packager = ArtifactPackager::new(staging.path().to_path_buf());

        let first = packager.package(&source, "r1").unwrap();
        let second = packager.package(&source, "r2").unwrap();

        assert_eq!(first.sha256(), second.sha256());
        assert_eq!(first.sha256().len(), 64);
    }

    #[test]
    fn test_existing_artifact_is_left_alone() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = write_source(src.path(), "a.js", "let x = 1;\n");
        let foreign = staging.path().join("codefix-r1.tar");
        fs::write(&foreign, b"not ours").unwrap();

        let packager = ArtifactPackager::new(staging.path().to_path_buf());
        let err = packager.package(&source, "r1").unwrap_err();

        match err {
            BundleError::IoError(e) => assert_eq!(e.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(&foreign).unwrap(), b"not ours");
    }

    #[test]
    fn test_missing_source() {
        let staging = TempDir::new().unwrap();
        let packager = ArtifactPackager::new(staging.path().to_path_buf());

        let result = packager.package(&staging.path().join("nope.rs"), "r1");

        assert!(matches!(result, Err(BundleError::SourceUnavailable { .. })));
        assert!(!packager.artifact_path("r1").exists());
    }

    #[test]
    fn test_size_limit_leaves_nothing_behind() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = write_source(src.path(), "big.txt", &"x".repeat(4096));
        let packager = ArtifactPackager::new(staging.path().to_path_buf()).with_max_bytes(1024);

        let result = packager.package(&source, "r1");

        match result {
            Err(BundleError::SizeExceeded {
                actual_bytes,
                limit_bytes,
            }) => {
                assert!(actual_bytes > 1024);
                assert_eq!(limit_bytes, 1024);
            }
            other => panic!("expected SizeExceeded, got {:?}", other),
        }
        assert!(!packager.artifact_path("r1").exists());
    }

    #[test]
    fn test_directory_is_rejected() {
        let src = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let packager = ArtifactPackager::new(staging.path().to_path_buf());

        let result = packager.package(src.path(), "r1");
        assert!(matches!(result, Err(BundleError::NotAFile(_))));
    }

    #[test]
    fn test_source_outside_root() {
        let src = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = write_source(other.path(), "x.go", "package x\n");

        let packager = ArtifactPackager::new(staging.path().to_path_buf())
            .with_root(src.path().to_path_buf());

        let result = packager.package(&source, "r1");
        assert!(matches!(result, Err(BundleError::PathNotInRoot(_))));
    }
}
