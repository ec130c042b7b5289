//! Similarity store adapters

mod local;
mod qdrant;
mod supabase;

pub use local::LocalVectorStore;
pub use qdrant::{QdrantConfig, QdrantVectorStore};
pub use supabase::{SupabaseConfig, SupabaseVectorStore};
