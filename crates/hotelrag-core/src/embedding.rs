//! Embedding provider trait

use async_trait::async_trait;

use crate::{Embedding, Result};

/// Trait for embedding providers.
///
/// The dimension is a property of the provider and must equal the index
/// dimension of the similarity store it is paired with.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a piece of text. Fails with `Error::EmbeddingFailed`.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    fn model_id(&self) -> &str;
}
