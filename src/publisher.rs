use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::AppConfig, upload::sanitize_filename};

/// 1x1 PNG written when no placeholder has been provisioned.
const FALLBACK_PLACEHOLDER_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
    0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to prepare static directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Copies generated images into the publicly served directory.
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    static_dir: PathBuf,
    base_url: String,
    mount_path: String,
    placeholder_name: String,
}

impl ResultPublisher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            static_dir: config.static_dir.clone(),
            base_url: config.public_base_url.trim_end_matches('/').to_string(),
            mount_path: config.static_mount.clone(),
            placeholder_name: config.placeholder_name.clone(),
        }
    }

    /// Creates the static directory and seeds the mock-mode placeholder if absent.
    pub async fn ensure_placeholder(&self) -> Result<(), PublishError> {
        fs::create_dir_all(&self.static_dir)
            .await
            .map_err(|source| PublishError::Directory {
                path: self.static_dir.clone(),
                source,
            })?;

        let placeholder = self.static_dir.join(&self.placeholder_name);
        if fs::try_exists(&placeholder).await.unwrap_or(false) {
            return Ok(());
        }

        warn!(path = %placeholder.display(), "placeholder image missing, writing a blank one");
        fs::write(&placeholder, FALLBACK_PLACEHOLDER_PNG)
            .await
            .map_err(|source| PublishError::Directory {
                path: placeholder.clone(),
                source,
            })
    }

    pub fn placeholder_url(&self) -> String {
        self.url_for(&self.placeholder_name)
    }

    pub fn published_name(request_id: Uuid, original_name: &str) -> String {
        format!("gen_{request_id}_{}", sanitize_filename(original_name))
    }

    /// Copies `source` into the static directory and returns its public URL.
    pub async fn publish(
        &self,
        source: &Path,
        original_name: &str,
        request_id: Uuid,
    ) -> Result<String, PublishError> {
        let name = Self::published_name(request_id, original_name);
        let destination = self.static_dir.join(&name);

        fs::copy(source, &destination)
            .await
            .map_err(|err| PublishError::Copy {
                from: source.to_path_buf(),
                to: destination.clone(),
                source: err,
            })?;

        let url = self.url_for(&name);
        info!(%request_id, path = %destination.display(), %url, "published generated image");
        Ok(url)
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}{}/{}", self.base_url, self.mount_path, name)
    }
}
