//! Test helpers: build the router against throwaway directories.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};
use pickabook_service::{
    AppConfig, GenerationParams, GradioClient, InferenceClient, Orchestrator, ProviderError,
    ResultPublisher, TempStorage, build_router,
};
use tempfile::TempDir;

pub const BASE_URL: &str = "http://localhost:8000";
pub const PLACEHOLDER_URL: &str = "http://localhost:8000/static/mock_placeholder.png";

/// Scripted provider standing in for the hosted model.
pub enum StubBehavior {
    Output(Vec<u8>),
    NoResult,
    Unavailable(&'static str),
}

pub struct StubClient {
    behavior: StubBehavior,
    output_dir: PathBuf,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl InferenceClient for StubClient {
    async fn generate(
        &self,
        face_path: &Path,
        pose_path: &Path,
        _params: &GenerationParams,
    ) -> Result<PathBuf, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((face_path.to_path_buf(), pose_path.to_path_buf()));
        // Yield so concurrent requests interleave while their inputs are on disk.
        tokio::time::sleep(Duration::from_millis(20)).await;

        match &self.behavior {
            StubBehavior::Output(bytes) => {
                let path = self
                    .output_dir
                    .join(format!("out_{}.png", uuid::Uuid::new_v4()));
                tokio::fs::write(&path, bytes).await.unwrap();
                Ok(path)
            }
            StubBehavior::NoResult => Err(ProviderError::NoResult("empty output".into())),
            StubBehavior::Unavailable(msg) => Err(ProviderError::Unavailable(msg.to_string())),
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub config: AppConfig,
    pub stub: Option<Arc<StubClient>>,
    pub _root: TempDir,
}

impl TestApp {
    pub fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.config.temp_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_file())
            .collect()
    }

    pub fn stub_calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.stub
            .as_ref()
            .map(|stub| stub.calls.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn static_path(&self, url: &str) -> PathBuf {
        let name = url
            .strip_prefix(&format!("{BASE_URL}/static/"))
            .expect("url under the static mount");
        self.config.static_dir.join(name)
    }
}

fn test_config(root: &Path, with_default_pose: bool) -> AppConfig {
    let mut config = AppConfig::from_env().unwrap();
    config.public_base_url = BASE_URL.to_string();
    config.static_dir = root.join("static");
    config.static_mount = "/static".to_string();
    config.temp_dir = root.join("tmp");
    config.default_pose_path = root.join("template.jpg");
    config.placeholder_name = "mock_placeholder.png".to_string();
    config.hf_token = None;
    config.inference_timeout = Duration::from_secs(5);
    if with_default_pose {
        std::fs::write(&config.default_pose_path, b"default-pose").unwrap();
    }
    config
}

async fn build_app(
    config: AppConfig,
    client: Arc<dyn InferenceClient>,
    stub: Option<Arc<StubClient>>,
    root: TempDir,
) -> TestApp {
    let publisher = ResultPublisher::new(&config);
    publisher.ensure_placeholder().await.unwrap();
    let storage = TempStorage::new(&config.temp_dir).await.unwrap();
    let orchestrator = Arc::new(Orchestrator::new(&config, storage, client, publisher));
    let router = build_router(Arc::new(config.clone()), orchestrator);

    TestApp {
        server: TestServer::new(router).unwrap(),
        config,
        stub,
        _root: root,
    }
}

/// App wired to the real provider client with no token configured.
pub async fn setup_without_credentials() -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), true);
    let client = Arc::new(GradioClient::new(&config, root.path().join("provider")).unwrap());
    build_app(config, client, None, root).await
}

/// App wired to a scripted provider.
pub async fn setup_with_stub(behavior: StubBehavior, with_default_pose: bool) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path(), with_default_pose);
    let output_dir = root.path().join("provider");
    std::fs::create_dir_all(&output_dir).unwrap();

    let stub = Arc::new(StubClient {
        behavior,
        output_dir,
        calls: Mutex::new(Vec::new()),
    });
    build_app(config, stub.clone(), Some(stub), root).await
}

pub fn photo_part(name: &str, content_type: &str, data: Vec<u8>) -> Part {
    Part::bytes(data).file_name(name).mime_type(content_type)
}

pub fn child_photo_form(name: &str, content_type: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("child_photo", photo_part(name, content_type, data))
}
