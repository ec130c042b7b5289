//! Core traits and types for HotelRAG
//!
//! This crate defines the data model of a retrieval-augmented answer, the error
//! taxonomy shared by every stage, and the capability-facing interfaces for
//! embedding providers, similarity stores and generative backends. Keeping the
//! adapters behind traits lets the orchestrator run against fakes in tests.

pub mod embedding;
pub mod error;
pub mod llm;
pub mod rag;
pub mod retry;
pub mod stream;
pub mod truncation;
pub mod types;
pub mod vector_store;


pub use embedding::EmbeddingProvider;
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerativeBackend};
pub use rag::{ChatMessage, Query, ResponseChunk, Role, Stage};
pub use retry::{RetryConfig, with_retry};
pub use stream::{TextStream, byte_lines};
pub use truncation::TruncationLadder;
pub use types::*;
pub use vector_store::{SearchRequest, SimilarityStore};
