//! Gemini integration for HotelRAG
//!
//! This crate provides the managed-API implementation of the
//! `EmbeddingProvider` and `GenerativeBackend` traits.

mod client;
mod config;


pub use client::GeminiClient;
pub use config::GeminiConfig;

// Re-export core types for convenience
pub use hotelrag_core::{
    EmbeddingProvider, Error, GenerationConfig, GenerativeBackend, Result, TruncationLadder,
};
