//! Retrieval-augmented generation for HotelRAG
//!
//! This crate provides the orchestrator that turns a query into a streamed,
//! grounded answer, the filter extractor, and the similarity-store adapters.

mod engine;
mod filters;
mod prompt;
mod response;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use engine::{RagConfig, RagPipeline};
pub use filters::{FilterExtractor, parse_filter};
pub use prompt::PromptContext;
pub use response::{CollectedResponse, ResponseStream};
pub use vector_store::{
    LocalVectorStore, QdrantConfig, QdrantVectorStore, SupabaseConfig, SupabaseVectorStore,
};

// Re-export core types for convenience
pub use hotelrag_core::{
    ChatMessage, EmbeddingProvider, Error, Filter, GenerativeBackend, Match, MatchSet, Query,
    ResponseChunk, Result, Role, SearchRequest, SimilarityStore, Stage,
};
