//! Client for a model hosted as a Gradio app (e.g. a Hugging Face Space).
//!
//! A call is four HTTP exchanges: upload each input file, submit the job,
//! read the job's server-sent event stream until `complete`, and download
//! the produced file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{fs, sync::OnceCell};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    inference::{GenerationParams, InferenceClient, ProviderError},
};

pub struct GradioClient {
    http: reqwest::Client,
    space_url: String,
    api_name: String,
    token: Option<String>,
    download_dir: PathBuf,
    api_prefix: OnceCell<String>,
}

impl std::fmt::Debug for GradioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradioClient")
            .field("space_url", &self.space_url)
            .field("api_name", &self.api_name)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SpaceConfig {
    #[serde(default)]
    api_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    event_id: String,
}

impl GradioClient {
    pub fn new(config: &AppConfig, download_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.inference_timeout)
            .build()
            .context("failed to create HTTP client for inference provider")?;

        Ok(Self {
            http,
            space_url: config.space_url.trim_end_matches('/').to_string(),
            api_name: config.api_name.trim_matches('/').to_string(),
            token: config.hf_token.clone(),
            download_dir: download_dir.into(),
            api_prefix: OnceCell::new(),
        })
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.bearer_auth(token)
    }

    async fn prefix(&self, token: &str) -> Result<&str, ProviderError> {
        let prefix = self
            .api_prefix
            .get_or_try_init(|| async {
                let url = format!("{}/config", self.space_url);
                let response = self
                    .authorized(self.http.get(&url), token)
                    .send()
                    .await
                    .map_err(transport)?;
                let config: SpaceConfig = check_status(response)
                    .await?
                    .json()
                    .await
                    .map_err(transport)?;
                let prefix = config
                    .api_prefix
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_string();
                debug!(api_prefix = %prefix, "resolved provider api prefix");
                Ok::<_, ProviderError>(prefix)
            })
            .await?;
        Ok(prefix.as_str())
    }

    async fn upload(&self, prefix: &str, token: &str, path: &Path) -> Result<Value, ProviderError> {
        let data = fs::read(path).await.map_err(|e| {
            ProviderError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let form = multipart::Form::new()
            .part("files", multipart::Part::bytes(data).file_name(file_name.clone()));
        let url = format!("{}{prefix}/upload", self.space_url);
        let response = self
            .authorized(self.http.post(&url), token)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let remote_paths: Vec<String> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        let remote_path = remote_paths.into_iter().next().ok_or_else(|| {
            ProviderError::Unavailable("upload returned no server path".to_string())
        })?;

        Ok(json!({
            "path": remote_path,
            "orig_name": file_name,
            "meta": { "_type": "gradio.FileData" },
        }))
    }

    async fn submit(
        &self,
        prefix: &str,
        token: &str,
        data: Vec<Value>,
    ) -> Result<String, ProviderError> {
        let url = format!("{}{prefix}/call/{}", self.space_url, self.api_name);
        let response = self
            .authorized(self.http.post(&url), token)
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(transport)?;
        let submitted: SubmitResponse =
            check_status(response).await?.json().await.map_err(transport)?;
        Ok(submitted.event_id)
    }

    async fn await_outputs(
        &self,
        prefix: &str,
        token: &str,
        event_id: &str,
    ) -> Result<Vec<Value>, ProviderError> {
        let url = format!("{}{prefix}/call/{}/{event_id}", self.space_url, self.api_name);
        let response = self
            .authorized(self.http.get(&url), token)
            .send()
            .await
            .map_err(transport)?;
        let body = check_status(response).await?.text().await.map_err(transport)?;
        parse_event_stream(&body)
    }

    async fn download(
        &self,
        prefix: &str,
        token: &str,
        output: &Value,
    ) -> Result<PathBuf, ProviderError> {
        let url = resolve_output_url(&self.space_url, prefix, output)?;
        let response = self
            .authorized(self.http.get(&url), token)
            .send()
            .await
            .map_err(transport)?;
        let bytes = check_status(response).await?.bytes().await.map_err(transport)?;

        fs::create_dir_all(&self.download_dir).await.map_err(|e| {
            ProviderError::Unavailable(format!(
                "failed to create download directory {}: {e}",
                self.download_dir.display()
            ))
        })?;
        let path = self
            .download_dir
            .join(format!("result_{}.{}", Uuid::new_v4(), output_extension(&url)));
        fs::write(&path, &bytes).await.map_err(|e| {
            ProviderError::Unavailable(format!("failed to save {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), size_bytes = bytes.len(), "downloaded provider output");
        Ok(path)
    }
}

#[async_trait]
impl InferenceClient for GradioClient {
    async fn generate(
        &self,
        face_path: &Path,
        pose_path: &Path,
        params: &GenerationParams,
    ) -> Result<PathBuf, ProviderError> {
        let token = self
            .token
            .as_deref()
            .ok_or(ProviderError::CredentialsMissing)?;

        info!(
            face = %face_path.display(),
            pose = %pose_path.display(),
            seed = params.seed,
            "sending images to inference provider"
        );

        let prefix = self.prefix(token).await?;
        let face = self.upload(prefix, token, face_path).await?;
        let pose = self.upload(prefix, token, pose_path).await?;

        let mut data = vec![face, pose];
        data.extend(params.positional_args());

        let event_id = self.submit(prefix, token, data).await?;
        debug!(%event_id, "provider job submitted");

        let outputs = self.await_outputs(prefix, token, &event_id).await?;
        let first = outputs
            .first()
            .filter(|v| !v.is_null())
            .ok_or_else(|| ProviderError::NoResult("provider returned an empty output".into()))?;

        self.download(prefix, token, first).await
    }
}

fn transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable(format!("request timed out: {err}"))
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Unavailable(format!(
        "provider request failed: {status} - {text}"
    )))
}

/// Extracts the output list from a job's server-sent event stream.
fn parse_event_stream(body: &str) -> Result<Vec<Value>, ProviderError> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => {
                    return match serde_json::from_str::<Value>(data) {
                        Ok(Value::Array(outputs)) => Ok(outputs),
                        Ok(Value::Null) => Ok(Vec::new()),
                        Ok(other) => Ok(vec![other]),
                        Err(e) => Err(ProviderError::Unavailable(format!(
                            "malformed provider result: {e}"
                        ))),
                    };
                }
                "error" => {
                    return Err(ProviderError::Unavailable(format!(
                        "provider reported an error: {data}"
                    )));
                }
                _ => {}
            }
        }
    }
    Err(ProviderError::Unavailable(
        "event stream ended without a result".to_string(),
    ))
}

fn resolve_output_url(
    space_url: &str,
    prefix: &str,
    output: &Value,
) -> Result<String, ProviderError> {
    let url = output.get("url").and_then(Value::as_str);
    let path = output
        .get("path")
        .and_then(Value::as_str)
        .or_else(|| output.as_str());

    match (url, path) {
        (Some(url), _) if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(url.to_string())
        }
        (Some(url), _) => Ok(format!("{space_url}{}", ensure_leading_slash(url))),
        (None, Some(path)) => Ok(format!("{space_url}{prefix}/file={path}")),
        (None, None) => Err(ProviderError::NoResult(format!(
            "unrecognised provider output: {output}"
        ))),
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn output_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) if matches!(ext, "png" | "jpg" | "jpeg" | "webp") => ext,
        _ => "png",
    }
}
