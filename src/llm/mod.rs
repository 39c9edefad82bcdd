pub mod gemini;

use async_trait::async_trait;

use crate::codec::ImageFile;

pub use gemini::{build_prompt, GeminiClient};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("API key is not configured; set API_KEY or GEMINI_API_KEY")]
    Configuration,
    #[error("No image was returned by the API ({0})")]
    NoImageReturned(String),
    #[error("Image generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    /// Configuration problems will fail again on retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::Configuration)
    }
}

/// Turns a portrait plus form fields into a base64-encoded generated image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        source: &ImageFile,
        age: &str,
        outfit: &str,
    ) -> Result<String, GenerationError>;
}
