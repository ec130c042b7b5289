//! Gemini configuration

use hotelrag_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Configuration for the Gemini client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Requested output dimensionality of embeddings.
    pub dimension: usize,
}

impl GeminiConfig {
    pub const DEFAULT_API_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash-lite";
    pub const DEFAULT_EMBEDDING_MODEL: &'static str = "gemini-embedding-001";
    pub const DEFAULT_DIMENSION: usize = 1024;

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("GOOGLE_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                Error::Configuration(
                    "GOOGLE_API_KEY or GEMINI_API_KEY environment variable not found".to_string(),
                )
            })?;

        let api_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| Self::DEFAULT_API_URL.to_string());

        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());

        let embedding_model = env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| Self::DEFAULT_EMBEDDING_MODEL.to_string());

        let dimension = match env::var("VECTOR_DIMENSION") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                Error::Configuration(format!("VECTOR_DIMENSION is not a positive integer: {raw}"))
            })?,
            Err(_) => Self::DEFAULT_DIMENSION,
        };

        let config = Self {
            api_key,
            api_url,
            model,
            embedding_model,
            dimension,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: Self::DEFAULT_API_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            embedding_model: Self::DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: Self::DEFAULT_DIMENSION,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Configuration("Gemini API key is empty".to_string()));
        }
        Url::parse(&self.api_url).map_err(|e| {
            Error::Configuration(format!("GEMINI_API_URL '{}' is invalid: {e}", self.api_url))
        })?;
        if self.dimension == 0 {
            return Err(Error::Configuration("VECTOR_DIMENSION must be positive".to_string()));
        }
        Ok(())
    }

    /// URL of a model method, e.g. `generateContent`.
    pub(crate) fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.api_url.trim_end_matches('/'),
            model,
            method
        )
    }
}
