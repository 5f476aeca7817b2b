// LanceDB vector index module
// Handles storage and similarity search for ingested document records

pub mod vector_store;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use vector_store::{SharedVectorStore, VectorStore};

/// Ingested document record stored in the vector index. Immutable once
/// created; the id is a pure function of the ingestion inputs, so repeated
/// upserts of the same document are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Sanitized identifier derived from document name, type, and confidence
    pub id: String,
    /// Document type reported by the analysis service
    pub document_type: String,
    /// Analysis confidence score
    pub confidence: f64,
    /// Concatenated "name: value" field text
    pub content: String,
    /// Embedding vector for the content
    pub vector: Vec<f32>,
    /// URL of the source document
    pub document_url: String,
}

/// One similarity-search hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub document_type: String,
    pub content: String,
    pub document_url: String,
    pub similarity_score: f32,
}

/// Put/search collaborator over the vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert one record keyed by its identifier. Returns whether the index
    /// acknowledged the write.
    async fn upsert(&self, record: &DocumentRecord) -> Result<bool>;

    /// Return up to `top_k` records most similar to the query vector.
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<IndexedDocument>>;
}
