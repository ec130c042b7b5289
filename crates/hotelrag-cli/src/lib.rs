//! Terminal chat surface for HotelRAG

mod session;
mod settings;
mod ui;

#[cfg(test)]
mod tests;

pub use session::Session;
pub use settings::{EmbedderKind, GeneratorKind, Settings, StoreKind};
pub use ui::{chunk_line, display_banner, print_chunk, print_references, prompt_line};

// Re-export core types
pub use hotelrag_core::{Error, Result};
