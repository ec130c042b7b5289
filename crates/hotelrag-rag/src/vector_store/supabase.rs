//! Supabase (PostgREST + pgvector) similarity store

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

use hotelrag_core::{
    Error, Match, MatchSet, Result, RetryConfig, SearchRequest, SimilarityStore, with_retry,
};

const DEFAULT_MATCH_FUNCTION: &str = "match_properties_1024";
const DEFAULT_FILTERED_MATCH_FUNCTION: &str = "match_properties_filtered";
const DEFAULT_DIMENSION: usize = 1024;

/// Configuration for the Supabase store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    /// RPC taking `query_embedding`, `match_threshold`, `match_count`.
    pub match_function: String,
    /// RPC that additionally takes `min_price` and `max_price`.
    pub filtered_match_function: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl SupabaseConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("SUPABASE_URL")
            .map_err(|_| Error::Configuration("SUPABASE_URL not set".to_string()))?;
        let key = env::var("SUPABASE_KEY")
            .map_err(|_| Error::Configuration("SUPABASE_KEY not set".to_string()))?;

        let dimension = match env::var("VECTOR_DIMENSION") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("VECTOR_DIMENSION is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_DIMENSION,
        };

        Ok(Self {
            match_function: env::var("SUPABASE_MATCH_FUNCTION")
                .unwrap_or_else(|_| DEFAULT_MATCH_FUNCTION.to_string()),
            filtered_match_function: env::var("SUPABASE_FILTERED_MATCH_FUNCTION")
                .unwrap_or_else(|_| DEFAULT_FILTERED_MATCH_FUNCTION.to_string()),
            dimension,
            ..Self::new(url, key)
        })
    }

    pub fn new(url: String, key: String) -> Self {
        Self {
            url,
            key,
            match_function: DEFAULT_MATCH_FUNCTION.to_string(),
            filtered_match_function: DEFAULT_FILTERED_MATCH_FUNCTION.to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.url)
            .map_err(|e| Error::Configuration(format!("Invalid SUPABASE_URL {}: {}", self.url, e)))?;
        if self.key.trim().is_empty() {
            return Err(Error::Configuration("SUPABASE_KEY is empty".to_string()));
        }
        if self.dimension == 0 {
            return Err(Error::Configuration("Vector dimension must be positive".to_string()));
        }
        Ok(())
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/", self.url.trim_end_matches('/'))
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}rpc/{}", self.rest_url(), function)
    }
}

/// A row returned by the match functions
#[derive(Debug, Deserialize)]
struct MatchRow {
    id: Value,
    rag_document: String,
    #[serde(default)]
    listing_url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    similarity: Option<f32>,
    #[serde(default)]
    price_cleaned: Option<f64>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        let id = match row.id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        Match {
            id,
            document: row.rag_document,
            reference: row.listing_url.unwrap_or_default(),
            name: row.name,
            similarity: row.similarity,
            price: row.price_cleaned,
        }
    }
}

/// Similarity store backed by Supabase RPC functions.
///
/// Whether the filtered match function exists is resolved once in
/// `connect`; without it filters are dropped.
pub struct SupabaseVectorStore {
    config: SupabaseConfig,
    client: Client,
    filters_supported: bool,
    connected: bool,
}

impl SupabaseVectorStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(config, client)
    }

    /// Create a store that sends its requests through `client`.
    pub fn with_client(config: SupabaseConfig, client: Client) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            client,
            filters_supported: false,
            connected: false,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.key)
            .bearer_auth(&self.config.key)
    }

    /// Fetch the PostgREST OpenAPI description. `None` when the key may not
    /// read it or the server does not publish it.
    async fn fetch_openapi(&self) -> Result<Option<Value>> {
        let response = self
            .authorized(self.client.get(self.config.rest_url()))
            .header("Accept", "application/openapi+json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            debug!(status = status.as_u16(), "OpenAPI description unavailable");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let document = response
            .json::<Value>()
            .await
            .map_err(|e| Error::Serialization(format!("Invalid OpenAPI document: {}", e)))?;
        Ok(Some(document))
    }

    async fn call_rpc(&self, function: &str, body: &Value) -> Result<MatchSet> {
        let response = self
            .authorized(self.client.post(self.config.rpc_url(function)))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse match rows: {}", e)))?;
        Ok(rows.into_iter().map(Match::from).collect())
    }
}

#[async_trait]
impl SimilarityStore for SupabaseVectorStore {
    async fn connect(&mut self) -> Result<()> {
        let document = with_retry(&self.config.retry, "supabase_openapi", || self.fetch_openapi()).await?;

        self.filters_supported = match document {
            Some(document) => has_rpc(&document, &self.config.filtered_match_function),
            None => {
                warn!("OpenAPI description not available, assuming no filtered match function");
                false
            }
        };

        if self.filters_supported {
            info!(function = %self.config.filtered_match_function, "Connected to Supabase with price filters");
        } else {
            warn!(
                function = %self.config.filtered_match_function,
                "Filtered match function not found, price filters will be ignored"
            );
        }

        self.connected = true;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<MatchSet> {
        if !self.connected {
            return Err(Error::StoreUnavailable("Supabase store not connected".to_string()));
        }

        let filtered = self.filters_supported && request.filter.is_some();
        if request.filter.is_some() && !filtered {
            debug!("Dropping price filter, store has no filtered match function");
        }

        let function = if filtered {
            &self.config.filtered_match_function
        } else {
            &self.config.match_function
        };
        let body = rpc_body(request, filtered);

        let mut matches =
            with_retry(&self.config.retry, "supabase_search", || self.call_rpc(function, &body)).await?;
        matches.truncate(request.count);

        debug!(function = %function, matches = matches.len(), "Supabase search complete");
        Ok(matches)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn supports_filters(&self) -> bool {
        self.filters_supported
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn rpc_body(request: &SearchRequest, filtered: bool) -> Value {
    let mut body = json!({
        "query_embedding": request.embedding,
        "match_threshold": request.threshold,
        "match_count": request.count,
    });

    if filtered {
        let filter = request.filter.unwrap_or_default();
        body["min_price"] = json!(filter.min_price);
        body["max_price"] = json!(filter.max_price);
    }

    body
}

fn has_rpc(openapi: &Value, function: &str) -> bool {
    openapi
        .get("paths")
        .and_then(Value::as_object)
        .is_some_and(|paths| paths.contains_key(&format!("/rpc/{}", function)))
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Error::StoreUnavailable(message)
    } else {
        Error::InvalidQuery(message)
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("Supabase request timed out: {}", err))
    } else {
        Error::StoreUnavailable(format!("Supabase request failed: {}", err))
    }
}
