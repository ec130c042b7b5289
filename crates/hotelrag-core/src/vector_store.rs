//! Similarity store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Embedding, Filter, MatchSet, Result};

/// A single similarity query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub embedding: Embedding,
    /// Only records with similarity >= threshold are eligible.
    pub threshold: f32,
    pub count: usize,
    pub filter: Option<Filter>,
}

impl SearchRequest {
    pub fn new(embedding: Embedding, threshold: f32, count: usize) -> Self {
        Self {
            embedding,
            threshold,
            count,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }
}

/// Trait for similarity stores (e.g., Supabase pgvector, Qdrant)
///
/// Implementations retry transient failures internally and surface
/// `Error::StoreUnavailable` once their retry budget is spent.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Initialize the store connection and resolve its capabilities.
    async fn connect(&mut self) -> Result<()>;

    /// Top-`count` records at or above `threshold`, most similar first.
    async fn search(&self, request: &SearchRequest) -> Result<MatchSet>;

    /// Index dimension.
    fn dimension(&self) -> usize;

    /// Whether `filter` is honoured. Stores without filter support drop it.
    fn supports_filters(&self) -> bool;

    /// Check if the store is connected
    fn is_connected(&self) -> bool;
}
