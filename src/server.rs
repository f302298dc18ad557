use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderValue,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::AppConfig,
    error::ServiceError,
    orchestrator::{GenerationOutcome, GenerationStatus, Orchestrator},
    upload::GenerateUpload,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: GenerationStatus,
    pub message: String,
    pub image_url: String,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            status: outcome.status(),
            message: outcome.message().to_string(),
            image_url: outcome.image_url().to_string(),
        }
    }
}

pub fn build_router(config: Arc<AppConfig>, orchestrator: Arc<Orchestrator>) -> Router {
    let cors = cors_layer(&config);
    let body_limit = config.body_limit();
    let static_files = ServeDir::new(&config.static_dir);
    let static_mount = config.static_mount.clone();

    let state = AppState { orchestrator };

    Router::new()
        .route("/", get(health))
        .route("/api/generate", post(generate))
        .nest_service(&static_mount, static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials forbid wildcards, so methods and headers are mirrored.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ServiceError> {
    let upload = GenerateUpload::from_multipart(multipart).await?;
    let outcome = state.orchestrator.generate(upload).await?;
    Ok(Json(outcome.into()))
}
