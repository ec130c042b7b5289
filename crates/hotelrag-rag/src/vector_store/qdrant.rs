//! Qdrant similarity store

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, Filter as QdrantFilter, PointId, Range, ScoredPoint, SearchPointsBuilder, Value,
};
use qdrant_client::{Qdrant, QdrantError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

use hotelrag_core::{
    Error, Filter, Match, MatchSet, Result, RetryConfig, SearchRequest, SimilarityStore, with_retry,
};

const DEFAULT_URL: &str = "http://localhost:6334";
const DEFAULT_COLLECTION: &str = "listings";
const PRICE_FIELD: &str = "price_cleaned";

/// Configuration for the Qdrant store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl QdrantConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let dimension = match env::var("VECTOR_DIMENSION") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("VECTOR_DIMENSION is not a number: {}", raw))
            })?,
            Err(_) => 1024,
        };

        Ok(Self {
            api_key: env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty()),
            collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_COLLECTION.to_string()),
            dimension,
            ..Self::new(env::var("QDRANT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()))
        })
    }

    pub fn new(url: String) -> Self {
        Self {
            url,
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            dimension: 1024,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.url)
            .map_err(|e| Error::Configuration(format!("Invalid QDRANT_URL {}: {}", self.url, e)))?;
        if self.collection.is_empty() {
            return Err(Error::Configuration("Qdrant collection name is empty".to_string()));
        }
        if self.dimension == 0 {
            return Err(Error::Configuration("Vector dimension must be positive".to_string()));
        }
        Ok(())
    }
}

/// Similarity store backed by a Qdrant collection with cosine distance.
///
/// Points carry the listing in their payload: `rag_document`, `listing_url`,
/// `name` and `price_cleaned`.
pub struct QdrantVectorStore {
    config: QdrantConfig,
    client: Qdrant,
    connected: bool,
}

impl QdrantVectorStore {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        config.validate()?;

        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self {
            config,
            client,
            connected: false,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(QdrantConfig::from_env()?)
    }

    async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.config.collection.clone())
            .await
            .map_err(classify_error)
    }

    async fn search_once(&self, request: &SearchRequest) -> Result<MatchSet> {
        let mut search = SearchPointsBuilder::new(
            self.config.collection.clone(),
            request.embedding.clone(),
            request.count as u64,
        )
        .score_threshold(request.threshold)
        .with_payload(true);

        if let Some(filter) = request.filter.as_ref().and_then(price_filter) {
            search = search.filter(filter);
        }

        let response = self.client.search_points(search).await.map_err(classify_error)?;
        Ok(response.result.into_iter().map(point_to_match).collect())
    }
}

#[async_trait]
impl SimilarityStore for QdrantVectorStore {
    async fn connect(&mut self) -> Result<()> {
        let exists =
            with_retry(&self.config.retry, "qdrant_connect", || self.collection_exists()).await?;

        if !exists {
            return Err(Error::Configuration(format!(
                "Qdrant collection {} does not exist",
                self.config.collection
            )));
        }

        info!(collection = %self.config.collection, "Connected to Qdrant");
        self.connected = true;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<MatchSet> {
        if !self.connected {
            return Err(Error::StoreUnavailable("Qdrant store not connected".to_string()));
        }

        let mut matches =
            with_retry(&self.config.retry, "qdrant_search", || self.search_once(request)).await?;
        matches.truncate(request.count);

        debug!(collection = %self.config.collection, matches = matches.len(), "Qdrant search complete");
        Ok(matches)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn supports_filters(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn price_filter(filter: &Filter) -> Option<QdrantFilter> {
    if filter.is_empty() {
        return None;
    }
    Some(QdrantFilter::must([Condition::range(
        PRICE_FIELD,
        Range {
            gte: filter.min_price,
            lte: filter.max_price,
            ..Default::default()
        },
    )]))
}

fn point_id(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(num)) => num.to_string(),
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        None => String::new(),
    }
}

fn payload_str(payload: &HashMap<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match payload.get(*key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    })
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::DoubleValue(v) => Some(*v),
        Kind::IntegerValue(v) => Some(*v as f64),
        _ => None,
    }
}

fn point_to_match(point: ScoredPoint) -> Match {
    let payload = &point.payload;
    Match {
        id: point_id(point.id.clone()),
        document: payload_str(payload, &["rag_document", "document"]).unwrap_or_default(),
        reference: payload_str(payload, &["listing_url", "reference"]).unwrap_or_default(),
        name: payload_str(payload, &["name"]),
        similarity: Some(point.score),
        price: payload_f64(payload, PRICE_FIELD),
    }
}

/// gRPC codes worth retrying: Unknown, DeadlineExceeded, ResourceExhausted,
/// Aborted, Internal, Unavailable.
fn is_transient_code(code: i32) -> bool {
    matches!(code, 2 | 4 | 8 | 10 | 13 | 14)
}

fn classify_error(err: QdrantError) -> Error {
    match err {
        QdrantError::ResponseError { status } => {
            let message = format!("{}: {}", status.code(), status.message());
            if is_transient_code(status.code() as i32) {
                Error::StoreUnavailable(message)
            } else {
                Error::InvalidQuery(message)
            }
        }
        QdrantError::ConversionError(message) => Error::InvalidQuery(message),
        other => Error::StoreUnavailable(other.to_string()),
    }
}
