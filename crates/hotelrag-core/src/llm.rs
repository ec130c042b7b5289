//! Generative backend trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, TextStream};

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    /// Bound on the whole non-streaming call, or on the time to the first
    /// byte of a streaming call.
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "gemini-2.5-flash-lite".to_string(),
            max_tokens: 1024,
            temperature: Some(0.2),
            top_p: Some(0.95),
            top_k: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Trait for generative backends (e.g., Gemini, Ollama)
///
/// `generate` is the single-payload form used for small structured replies;
/// `generate_stream` returns the answer as it is produced.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Generate a complete reply.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Start a streamed reply. Errors after the stream starts arrive as
    /// `Err` items; the stream ends after the first of them.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
