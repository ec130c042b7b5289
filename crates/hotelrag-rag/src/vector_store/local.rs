//! In-memory similarity store

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

use hotelrag_core::{Embedding, Error, Match, MatchSet, Result, SearchRequest, SimilarityStore};

struct StoredListing {
    listing: Match,
    embedding: Embedding,
}

/// One line of a listings export
#[derive(Deserialize)]
struct ListingRecord {
    id: Value,
    #[serde(alias = "rag_document")]
    document: String,
    #[serde(alias = "listing_url")]
    reference: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "price_cleaned")]
    price: Option<f64>,
    embedding: Embedding,
}

/// Local in-memory similarity store using exact cosine similarity.
///
/// Useful offline and in tests; loads listings with precomputed embeddings
/// from JSON Lines.
pub struct LocalVectorStore {
    listings: Arc<RwLock<Vec<StoredListing>>>,
    dimension: usize,
    connected: bool,
}

impl LocalVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            listings: Arc::new(RwLock::new(Vec::new())),
            dimension,
            connected: false,
        }
    }

    pub fn insert(&self, listing: Match, embedding: Embedding) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "listing {} has {} dimensions, store expects {}",
                listing.id,
                embedding.len(),
                self.dimension
            )));
        }

        let mut listings = self
            .listings
            .write()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))?;
        listings.push(StoredListing { listing, embedding });
        Ok(())
    }

    /// Load listings from a JSON Lines file. Returns the number loaded.
    pub async fn load_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let mut loaded = 0;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ListingRecord = serde_json::from_str(line).map_err(|e| {
                Error::Serialization(format!("{}:{}: {}", path.display(), line_no + 1, e))
            })?;

            let id = match record.id {
                Value::String(id) => id,
                other => other.to_string(),
            };
            let mut listing = Match::new(id, record.document, record.reference);
            listing.name = record.name;
            listing.price = record.price;

            self.insert(listing, record.embedding)?;
            loaded += 1;
        }

        info!(path = %path.display(), loaded, "Loaded listings");
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.listings.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl SimilarityStore for LocalVectorStore {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<MatchSet> {
        if !self.connected {
            return Err(Error::StoreUnavailable("Local store not connected".to_string()));
        }
        if request.embedding.len() != self.dimension {
            return Err(Error::InvalidQuery(format!(
                "query has {} dimensions, store expects {}",
                request.embedding.len(),
                self.dimension
            )));
        }

        let listings = self
            .listings
            .read()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))?;

        let filter = request.filter.unwrap_or_default();
        let mut results: MatchSet = listings
            .iter()
            .filter(|stored| filter.accepts(stored.listing.price))
            .filter_map(|stored| {
                let similarity = Self::cosine_similarity(&request.embedding, &stored.embedding);
                (similarity >= request.threshold)
                    .then(|| stored.listing.clone().with_similarity(similarity))
            })
            .collect();

        results.sort_by(|a, b| {
            let (sa, sb) = (a.similarity.unwrap_or(0.0), b.similarity.unwrap_or(0.0));
            match sb.total_cmp(&sa) {
                Ordering::Equal => a.id.cmp(&b.id),
                order => order,
            }
        });
        results.truncate(request.count);

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn supports_filters(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
