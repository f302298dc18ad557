use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::ServiceError, upload::sanitize_filename};

/// Scratch directory for request inputs awaiting inference.
#[derive(Debug, Clone)]
pub struct TempStorage {
    dir: Arc<PathBuf>,
}

impl TempStorage {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            ServiceError::Storage(format!(
                "failed to create temp directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir: Arc::new(dir) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a stored asset will occupy; the request id keeps it unique per request.
    pub fn asset_path(&self, request_id: Uuid, label: &str, original_name: &str) -> PathBuf {
        let name = sanitize_filename(original_name);
        let file_name = if label.is_empty() {
            format!("temp_{request_id}_{name}")
        } else {
            format!("temp_{request_id}_{label}_{name}")
        };
        self.dir.join(file_name)
    }

    /// Writes `data` and flushes it to disk before returning.
    pub async fn store(&self, path: &Path, data: &[u8]) -> Result<(), ServiceError> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            ServiceError::Storage(format!("failed to create {}: {e}", path.display()))
        })?;
        file.write_all(data).await.map_err(|e| {
            ServiceError::Storage(format!("failed to write {}: {e}", path.display()))
        })?;
        file.sync_all().await.map_err(|e| {
            ServiceError::Storage(format!("failed to sync {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), size_bytes = data.len(), "stored temporary asset");
        Ok(())
    }

    /// Deletes `path`. A missing file is not an error.
    pub async fn release(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Every temporary file created for one request.
///
/// `release_all` deletes them exactly once. If the guard is dropped first
/// (early return, panic, cancelled request future) the remaining files are
/// removed synchronously in `Drop`.
pub struct TempAssets {
    storage: TempStorage,
    request_id: Uuid,
    paths: Vec<PathBuf>,
}

impl TempAssets {
    pub fn new(storage: TempStorage, request_id: Uuid) -> Self {
        Self {
            storage,
            request_id,
            paths: Vec::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub async fn store(
        &mut self,
        label: &str,
        original_name: &str,
        data: &[u8],
    ) -> Result<PathBuf, ServiceError> {
        let path = self.storage.asset_path(self.request_id, label, original_name);
        // Tracked before writing so a partial write is still cleaned up.
        self.paths.push(path.clone());
        self.storage.store(&path, data).await?;
        Ok(path)
    }

    /// Adopts a file created elsewhere (e.g. a downloaded provider output).
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub async fn release_all(mut self) {
        for path in std::mem::take(&mut self.paths) {
            if let Err(err) = self.storage.release(&path).await {
                warn!(
                    request_id = %self.request_id,
                    path = %path.display(),
                    error = %err,
                    "failed to release temporary asset"
                );
            }
        }
    }
}

impl Drop for TempAssets {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    request_id = %self.request_id,
                    path = %path.display(),
                    error = %err,
                    "failed to release temporary asset on drop"
                ),
            }
        }
    }
}
