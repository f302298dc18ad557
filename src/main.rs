use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pickabook_service::{
    AppConfig, GradioClient, InferenceClient, Orchestrator, ResultPublisher, TempStorage,
    build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    match config.masked_token() {
        Some(token) => tracing::info!(%token, "HF_TOKEN loaded"),
        None => tracing::warn!("no HF_TOKEN found, generation requests will run in mock mode"),
    }

    let publisher = ResultPublisher::new(config.as_ref());
    publisher.ensure_placeholder().await?;

    let storage = TempStorage::new(&config.temp_dir).await?;
    let client: Arc<dyn InferenceClient> = Arc::new(GradioClient::new(
        config.as_ref(),
        storage.dir().join("provider"),
    )?);
    tracing::info!(
        space = %config.space_url,
        temp_dir = %storage.dir().display(),
        "pipeline ready"
    );

    let orchestrator = Arc::new(Orchestrator::new(
        config.as_ref(),
        storage,
        client,
        publisher,
    ));
    let router = build_router(config.clone(), orchestrator);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
