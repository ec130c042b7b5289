//! Ollama configuration

use hotelrag_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

/// Configuration for the Ollama client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    /// Dimension of `embedding_model`'s vectors.
    pub dimension: usize,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_EMBEDDING_MODEL: &'static str = "mxbai-embed-large";
    pub const DEFAULT_GENERATION_MODEL: &'static str = "llama3.2";
    pub const DEFAULT_DIMENSION: usize = 1024;

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());

        let embedding_model = env::var("OLLAMA_EMBEDDING_MODEL")
            .unwrap_or_else(|_| Self::DEFAULT_EMBEDDING_MODEL.to_string());

        let generation_model = env::var("OLLAMA_GENERATION_MODEL")
            .unwrap_or_else(|_| Self::DEFAULT_GENERATION_MODEL.to_string());

        let dimension = match env::var("VECTOR_DIMENSION") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                Error::Configuration(format!("VECTOR_DIMENSION is not a positive integer: {raw}"))
            })?,
            Err(_) => Self::DEFAULT_DIMENSION,
        };

        let config = Self {
            base_url,
            embedding_model,
            generation_model,
            dimension,
            timeout: Duration::from_secs(120),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit models against the default server
    pub fn new(embedding_model: String, generation_model: String, dimension: usize) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            embedding_model,
            generation_model,
            dimension,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url).map_err(|e| {
            Error::Configuration(format!("OLLAMA_BASE_URL '{}' is invalid: {e}", self.base_url))
        })?;
        if self.dimension == 0 {
            return Err(Error::Configuration("VECTOR_DIMENSION must be positive".to_string()));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }
}
