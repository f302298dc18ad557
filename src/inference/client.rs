use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::inference::GenerationParams;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no provider credentials configured")]
    CredentialsMissing,
    #[error("provider returned no result: {0}")]
    NoResult(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Outcomes that degrade to a placeholder response instead of failing the request.
    pub fn is_mock_fallback(&self) -> bool {
        matches!(
            self,
            ProviderError::CredentialsMissing | ProviderError::NoResult(_)
        )
    }
}

/// Remote face-preserving stylization. One attempt per call, no retries.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Returns a local path to the generated image.
    async fn generate(
        &self,
        face_path: &Path,
        pose_path: &Path,
        params: &GenerationParams,
    ) -> Result<PathBuf, ProviderError>;
}
