pub mod config;
pub mod error;
pub mod inference;
pub mod orchestrator;
pub mod publisher;
pub mod server;
pub mod storage;
pub mod upload;

pub use config::AppConfig;
pub use inference::{GenerationParams, GradioClient, InferenceClient, ProviderError};
pub use orchestrator::{GenerationOutcome, GenerationStatus, Orchestrator};
pub use publisher::ResultPublisher;
pub use server::build_router;
pub use storage::TempStorage;
