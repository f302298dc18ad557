mod client;
mod gradio;
mod types;

pub use client::{InferenceClient, ProviderError};
pub use gradio::GradioClient;
pub use types::GenerationParams;
