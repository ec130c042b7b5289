//! Ollama client implementation

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::ready;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use hotelrag_core::{
    Embedding, EmbeddingProvider, Error, GenerativeBackend, Result, TextStream, TruncationLadder,
    byte_lines,
};

use crate::config::OllamaConfig;

/// Ollama client serving both embeddings and generation from a local server
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
    ladder: TruncationLadder,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self {
            config,
            client,
            ladder: TruncationLadder::default(),
        })
    }

    /// Create a new Ollama client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env()?)
    }

    /// Replace the truncation ladder used for oversized embedding inputs
    pub fn with_truncation(mut self, ladder: TruncationLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// One embedding request for exactly `text`.
    async fn embed_once(&self, text: String) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            prompt: &text,
        };

        let response = self
            .client
            .post(self.config.endpoint("embeddings"))
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_embedding_failure(status, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Malformed Ollama response: {e}")))?;

        if parsed.embedding.len() != self.config.dimension {
            return Err(Error::EmbeddingFailed(format!(
                "model {} returned {} dimensions, expected {}",
                self.config.embedding_model,
                parsed.embedding.len(),
                self.config.dimension
            )));
        }

        Ok(parsed.embedding)
    }

    async fn send_generate(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let request = GenerateRequest {
            model: &self.config.generation_model,
            prompt,
            stream,
        };

        let send = self
            .client
            .post(self.config.endpoint("generate"))
            .json(&request)
            .send();

        let response = match timeout(self.config.timeout, send).await {
            Ok(result) => result.map_err(|e| Error::GenerationFailed(e.to_string()))?,
            Err(_) => return Err(Error::Timeout("Ollama did not respond in time".to_string())),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenerationFailed(format!(
                "Ollama request failed with status {}: {}",
                status,
                error_message(&body)
            )));
        }

        Ok(response)
    }
}

/// Decode one NDJSON line of `/api/generate`. Returns the text fragment and
/// whether the model signalled completion; blank lines yield `None`.
pub(crate) fn parse_generate_line(line: &str) -> Result<Option<(String, bool)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: GenerateResponse = serde_json::from_str(line)
        .map_err(|e| Error::GenerationFailed(format!("Malformed stream line: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(Error::GenerationFailed(error));
    }

    Ok(Some((chunk.response, chunk.done)))
}

/// Distinguish context-length rejections from other embedding faults.
pub(crate) fn classify_embedding_failure(status: StatusCode, body: &str) -> Error {
    let message = error_message(body);
    let lower = message.to_lowercase();
    let too_long = ["context length", "input length", "too long", "exceeds the maximum"]
        .iter()
        .any(|needle| lower.contains(needle));

    if too_long {
        Error::ContextLengthExceeded(message)
    } else {
        Error::EmbeddingFailed(format!("Ollama returned {status}: {message}"))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(Error::EmbeddingFailed("cannot embed empty text".to_string()));
        }
        debug!(model = %self.config.embedding_model, chars = text.chars().count(), "Embedding text");
        self.ladder.run(text, |input| self.embed_once(input)).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_id(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl GenerativeBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send_generate(prompt, false).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationFailed(format!("Malformed Ollama response: {e}")))?;

        match parsed.error {
            Some(error) => Err(Error::GenerationFailed(error)),
            None => Ok(parsed.response),
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self.send_generate(prompt, true).await?;

        let tokens = byte_lines(response.bytes_stream())
            .scan(false, |finished, line| {
                if *finished {
                    return ready(None);
                }
                let item = match line {
                    Err(e) => {
                        *finished = true;
                        Err(Error::GenerationFailed(format!("Stream interrupted: {e}")))
                    }
                    Ok(line) => match parse_generate_line(&line) {
                        Ok(Some((text, done))) => {
                            *finished = done;
                            Ok(text)
                        }
                        Ok(None) => Ok(String::new()),
                        Err(e) => {
                            *finished = true;
                            Err(e)
                        }
                    },
                };
                ready(Some(item))
            })
            .filter(|item| ready(!matches!(item, Ok(text) if text.is_empty())))
            .boxed();

        Ok(tokens)
    }

    fn model_id(&self) -> &str {
        &self.config.generation_model
    }
}
