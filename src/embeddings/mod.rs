pub mod client;

use anyhow::Result;

pub use client::EmbeddingClient;

/// Text-to-vector collaborator. Fails hard on empty input and backend
/// errors; best-effort callers catch at their own layer.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
