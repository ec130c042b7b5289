//! Ollama integration for HotelRAG
//!
//! This crate provides the local-model implementation of the
//! `EmbeddingProvider` and `GenerativeBackend` traits.

mod client;
mod config;


pub use client::OllamaClient;
pub use config::OllamaConfig;

// Re-export core types for convenience
pub use hotelrag_core::{EmbeddingProvider, Error, GenerativeBackend, Result, TruncationLadder};
