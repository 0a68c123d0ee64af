//! Working-directory management.
//!
//! The service owns one shared working directory for its lifetime. Every
//! request carves out its own [`Scratch`] directory inside it with a random
//! name, so two requests uploading `report.docx` at the same moment never
//! touch each other's files and no locking is needed.
//!
//! [`Scratch`] is a guard. [`Scratch::release`] and [`Scratch::discard`]
//! remove it on the blocking pool and wait for the removal; dropping it
//! unreleased (a client disconnecting mid-request, a panic) hands the
//! removal to the blocking pool without waiting, or removes it inline when
//! no runtime is around. Removal never runs on an async worker thread.

use crate::convert::ConvertedDocument;
use crate::error::ServiceError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of per-request scratch directories.
const SCRATCH_PREFIX: &str = "req-";

/// The shared working directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create `dir` if absent and resolve it to an absolute path.
    pub fn open(dir: &Path) -> Result<Self, ServiceError> {
        let to_err = |source| ServiceError::WorkDir {
            path: dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(to_err)?;
        let root = std::fs::canonicalize(dir).map_err(to_err)?;
        debug!("Working directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh scratch directory for one request.
    pub fn scratch(&self) -> io::Result<Scratch> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)?;
        Ok(Scratch {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }
}

/// One request's private directory. Removed on drop.
#[derive(Debug)]
pub struct Scratch {
    path: PathBuf,
    /// `None` once removed.
    dir: Option<TempDir>,
}

/// The upload as persisted in a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub path: PathBuf,
}

impl Scratch {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the upload's bytes under `file_name`, overwriting any file of
    /// that name already in this scratch directory.
    pub async fn store(&self, file_name: &str, bytes: &[u8]) -> io::Result<StoredUpload> {
        let path = self.path.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(StoredUpload { path })
    }

    /// Delete the upload and, if one was produced, the converted document,
    /// then remove the scratch directory.
    ///
    /// Best effort: files that are already gone are ignored, other failures
    /// are logged and never reach the client.
    pub async fn release(mut self, upload: &StoredUpload, converted: &ConvertedDocument) {
        remove_quietly(&upload.path).await;
        if let ConvertedDocument::NewlyProduced(path) = converted {
            if path != &upload.path {
                remove_quietly(path).await;
            }
        }

        self.remove_dir().await;
    }

    /// Remove the directory and whatever is left in it.
    pub async fn discard(mut self) {
        self.remove_dir().await;
    }

    async fn remove_dir(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!("Removed scratch directory {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
            Err(e) => warn!("Removal of {} did not finish: {}", path.display(), e),
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        debug!("Dropping unreleased scratch directory {}", self.path.display());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(dir));
            }
            Err(_) => drop(dir),
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/uploads");
        let ws = Workspace::open(&dir).unwrap();
        assert!(ws.root().is_dir());
        assert!(ws.root().is_absolute());
    }

    #[tokio::test]
    async fn scratch_directories_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let a = ws.scratch().unwrap();
        let b = ws.scratch().unwrap();
        assert_ne!(a.path(), b.path());

        let ua = a.store("report.pdf", b"a").await.unwrap();
        let ub = b.store("report.pdf", b"b").await.unwrap();
        assert_eq!(std::fs::read(&ua.path).unwrap(), b"a");
        assert_eq!(std::fs::read(&ub.path).unwrap(), b"b");
    }

    #[test]
    fn dropping_scratch_outside_runtime_removes_inline() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let scratch = ws.scratch().unwrap();
        let file = scratch.path().join("photo.png");
        std::fs::write(&file, b"not really").unwrap();
        let dir = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn dropping_scratch_in_runtime_removes_in_background() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let scratch = ws.scratch().unwrap();
        scratch.store("photo.png", b"not really").await.unwrap();
        std::fs::create_dir_all(scratch.path().join("profile/user/config")).unwrap();
        let dir = scratch.path().to_path_buf();
        drop(scratch);

        for _ in 0..100 {
            if !dir.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn discard_removes_nested_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let scratch = ws.scratch().unwrap();
        scratch.store("letter.docx", b"docx").await.unwrap();
        let profile = scratch.path().join("profile/user/registrymodifications.xcu");
        std::fs::create_dir_all(profile.parent().unwrap()).unwrap();
        std::fs::write(&profile, b"<xml/>").unwrap();

        scratch.discard().await;
        assert_eq!(std::fs::read_dir(ws.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn release_removes_produced_document() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let scratch = ws.scratch().unwrap();
        let upload = scratch.store("letter.docx", b"docx").await.unwrap();
        let produced = scratch.path().join("letter.pdf");
        std::fs::write(&produced, b"%PDF").unwrap();
        let dir = scratch.path().to_path_buf();

        scratch
            .release(&upload, &ConvertedDocument::NewlyProduced(produced.clone()))
            .await;
        assert!(!produced.exists());
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(ws.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn release_tolerates_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let scratch = ws.scratch().unwrap();
        let upload = scratch.store("doc.pdf", b"%PDF").await.unwrap();
        std::fs::remove_file(&upload.path).unwrap();

        scratch.release(&upload, &ConvertedDocument::SameAsInput).await;
        assert_eq!(std::fs::read_dir(ws.root()).unwrap().count(), 0);
    }
}
