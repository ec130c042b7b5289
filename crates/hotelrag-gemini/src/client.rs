//! Gemini client implementation

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::ready;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use hotelrag_core::{
    Embedding, EmbeddingProvider, Error, GenerationConfig, GenerativeBackend, Result, TextStream,
    TruncationLadder, byte_lines,
};

use crate::config::GeminiConfig;

/// Gemini client
pub struct GeminiClient {
    config: GeminiConfig,
    generation: GenerationConfig,
    client: Client,
    ladder: TruncationLadder,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Serialize)]
pub(crate) struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
pub(crate) struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let generation = GenerationConfig {
            model_id: config.model.clone(),
            ..Default::default()
        };

        Ok(Self {
            config,
            generation,
            client,
            ladder: TruncationLadder::default(),
        })
    }

    /// Create a new Gemini client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// Override sampling parameters; `model_id` is taken from the config.
    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = GenerationConfig {
            model_id: self.config.model.clone(),
            ..generation
        };
        self
    }

    pub fn with_truncation(mut self, ladder: TruncationLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub(crate) fn generate_body<'a>(&self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationParams {
                temperature: self.generation.temperature,
                top_p: self.generation.top_p,
                top_k: self.generation.top_k,
                max_output_tokens: self.generation.max_tokens,
            },
        }
    }

    async fn embed_once(&self, text: String) -> Result<Embedding> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: EmbedContent {
                parts: vec![Part { text: &text }],
            },
            task_type: "RETRIEVAL_QUERY",
            output_dimensionality: self.config.dimension,
        };

        let response = self
            .client
            .post(self.config.method_url(&self.config.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.generation.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_embedding_failure(status, &body));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Malformed Gemini response: {e}")))?;

        let values = parsed.embedding.values;
        if values.len() != self.config.dimension {
            return Err(Error::EmbeddingFailed(format!(
                "model {} returned {} dimensions, expected {}",
                self.config.embedding_model,
                values.len(),
                self.config.dimension
            )));
        }

        Ok(values)
    }

    async fn send_generate(&self, prompt: &str, method: &str) -> Result<reqwest::Response> {
        let send = self
            .client
            .post(self.config.method_url(&self.config.model, method))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.generate_body(prompt))
            .send();

        let response = match timeout(self.generation.timeout, send).await {
            Ok(result) => result.map_err(|e| Error::GenerationFailed(e.to_string()))?,
            Err(_) => return Err(Error::Timeout("Gemini did not respond in time".to_string())),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenerationFailed(format!(
                "Gemini API request failed with status {}: {}",
                status,
                error_message(&body)
            )));
        }

        Ok(response)
    }
}

impl GenerateContentResponse {
    /// Text of the first candidate. A blocked prompt or an embedded API error
    /// is a generation failure.
    pub(crate) fn into_text(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::GenerationFailed(error.message));
        }

        if self.candidates.is_empty() {
            if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(Error::GenerationFailed(format!("prompt blocked: {reason}")));
            }
        }

        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }
}

/// Decode one line of a `streamGenerateContent?alt=sse` body.
pub(crate) fn parse_sse_line(line: &str) -> Result<Option<String>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| Error::GenerationFailed(format!("Malformed stream event: {e}")))?;
    chunk.into_text().map(Some)
}

pub(crate) fn classify_embedding_failure(status: StatusCode, body: &str) -> Error {
    let message = error_message(body);
    let lower = message.to_lowercase();
    let too_long = ["token count", "exceeds the maximum", "too long", "context length"]
        .iter()
        .any(|needle| lower.contains(needle));

    if status == StatusCode::BAD_REQUEST && too_long {
        Error::ContextLengthExceeded(message)
    } else {
        Error::EmbeddingFailed(format!("Gemini returned {status}: {message}"))
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{} ({})", envelope.error.message, status),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(Error::EmbeddingFailed("cannot embed empty text".to_string()));
        }
        debug!(model = %self.config.embedding_model, "Embedding text");
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
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send_generate(prompt, "generateContent").await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationFailed(format!("Malformed Gemini response: {e}")))?;
        parsed.into_text()
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let response = self
            .send_generate(prompt, "streamGenerateContent?alt=sse")
            .await?;

        let tokens = byte_lines(response.bytes_stream())
            .scan(false, |failed, line| {
                if *failed {
                    return ready(None);
                }
                let item = match line {
                    Err(e) => Err(Error::GenerationFailed(format!("Stream interrupted: {e}"))),
                    Ok(line) => parse_sse_line(&line).map(Option::unwrap_or_default),
                };
                *failed = item.is_err();
                ready(Some(item))
            })
            .filter(|item| ready(!matches!(item, Ok(text) if text.is_empty())))
            .boxed();

        Ok(tokens)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
