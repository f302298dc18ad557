//! The upload → store → infer → publish pipeline for one request.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ServiceError,
    inference::{GenerationParams, InferenceClient, ProviderError},
    publisher::ResultPublisher,
    storage::{TempAssets, TempStorage},
    upload::{GenerateUpload, UploadPolicy, UploadRole},
};

pub const SUCCESS_MESSAGE: &str = "Image generated successfully";
pub const MOCK_MESSAGE: &str = "No API Token found. Returned placeholder image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Success,
    MockMode,
}

/// Terminal states of a request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Published { url: String },
    MockFallback { url: String },
}

impl GenerationOutcome {
    pub fn status(&self) -> GenerationStatus {
        match self {
            GenerationOutcome::Published { .. } => GenerationStatus::Success,
            GenerationOutcome::MockFallback { .. } => GenerationStatus::MockMode,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            GenerationOutcome::Published { .. } => SUCCESS_MESSAGE,
            GenerationOutcome::MockFallback { .. } => MOCK_MESSAGE,
        }
    }

    pub fn image_url(&self) -> &str {
        match self {
            GenerationOutcome::Published { url } | GenerationOutcome::MockFallback { url } => url,
        }
    }
}

pub struct Orchestrator {
    policy: UploadPolicy,
    storage: TempStorage,
    client: Arc<dyn InferenceClient>,
    publisher: ResultPublisher,
    default_pose_path: PathBuf,
    inference_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        storage: TempStorage,
        client: Arc<dyn InferenceClient>,
        publisher: ResultPublisher,
    ) -> Self {
        Self {
            policy: UploadPolicy::default(),
            storage,
            client,
            publisher,
            default_pose_path: config.default_pose_path.clone(),
            inference_timeout: config.inference_timeout,
        }
    }

    pub async fn generate(
        &self,
        upload: GenerateUpload,
    ) -> Result<GenerationOutcome, ServiceError> {
        // Nothing touches disk until both files pass.
        self.policy.validate(&upload.child_photo, UploadRole::Face)?;
        if let Some(template) = upload.template_image.as_ref() {
            self.policy.validate(template, UploadRole::Template)?;
        }

        let request_id = Uuid::new_v4();
        let mut assets = TempAssets::new(self.storage.clone(), request_id);
        let result = self.dispatch(&mut assets, &upload).await;
        assets.release_all().await;

        match &result {
            Ok(outcome) => info!(%request_id, status = ?outcome.status(), "generation finished"),
            Err(err) => warn!(%request_id, error = %err, "generation failed"),
        }
        result
    }

    async fn dispatch(
        &self,
        assets: &mut TempAssets,
        upload: &GenerateUpload,
    ) -> Result<GenerationOutcome, ServiceError> {
        let request_id = assets.request_id();
        let child = &upload.child_photo;
        let face_path = assets.store("", &child.filename, &child.data).await?;

        let pose_path = match upload.template_image.as_ref() {
            Some(template) => {
                assets
                    .store("template", &template.filename, &template.data)
                    .await?
            }
            None => match self.default_pose().await {
                Some(path) => path,
                None => {
                    warn!(
                        %request_id,
                        path = %self.default_pose_path.display(),
                        "default pose image not found"
                    );
                    return Ok(self.mock_fallback());
                }
            },
        };

        let params = GenerationParams::with_random_seed();
        let generated = match self.call_provider(&face_path, &pose_path, &params).await {
            Ok(path) => path,
            Err(err) if err.is_mock_fallback() => {
                info!(%request_id, reason = %err, "falling back to mock mode");
                return Ok(self.mock_fallback());
            }
            Err(err) => return Err(err.into()),
        };
        assets.track(generated.clone());

        let url = self
            .publisher
            .publish(&generated, &child.filename, request_id)
            .await?;
        Ok(GenerationOutcome::Published { url })
    }

    async fn call_provider(
        &self,
        face_path: &Path,
        pose_path: &Path,
        params: &GenerationParams,
    ) -> Result<PathBuf, ProviderError> {
        tokio::time::timeout(
            self.inference_timeout,
            self.client.generate(face_path, pose_path, params),
        )
        .await
        .map_err(|_| {
            ProviderError::Unavailable(format!(
                "no response within {}s",
                self.inference_timeout.as_secs()
            ))
        })?
    }

    async fn default_pose(&self) -> Option<PathBuf> {
        let path = fs::canonicalize(&self.default_pose_path).await.ok()?;
        fs::metadata(&path)
            .await
            .ok()
            .filter(|meta| meta.is_file())
            .map(|_| path)
    }

    fn mock_fallback(&self) -> GenerationOutcome {
        GenerationOutcome::MockFallback {
            url: self.publisher.placeholder_url(),
        }
    }
}
