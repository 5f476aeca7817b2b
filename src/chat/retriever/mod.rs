#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::lancedb::VectorIndex;
use crate::embeddings::Embedder;

/// Sentinel URL for indexed documents that have no source link. References
/// carrying it are kept for prompt context but excluded from citation lists.
pub const NO_URL: &str = "N/A";

/// One retrieved document surfaced to the generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub id: String,
    pub content: String,
    pub url: String,
}

impl Reference {
    /// Whether this reference can be cited with a working link.
    #[inline]
    pub fn has_url(&self) -> bool {
        self.url != NO_URL && !self.url.is_empty()
    }
}

/// Best-effort context lookup for a chat turn: embeds the user message and
/// searches the vector index. Any failure degrades to an empty result so the
/// turn proceeds without retrieval.
pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    enabled: bool,
}

impl ContextRetriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        enabled: bool,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            enabled,
        }
    }

    #[inline]
    pub async fn retrieve(&self, query: &str) -> Vec<Reference> {
        if !self.enabled {
            debug!("Retrieval disabled, skipping context lookup");
            return Vec::new();
        }

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Failed to embed query for retrieval: {:#}", e);
                return Vec::new();
            }
        };

        let documents = match self.index.search(&query_vector, self.top_k).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Vector search failed: {:#}", e);
                return Vec::new();
            }
        };

        let references: Vec<Reference> = documents
            .into_iter()
            .filter(|doc| !doc.content.trim().is_empty())
            .map(|doc| Reference {
                id: doc.id,
                content: doc.content,
                url: if doc.document_url.is_empty() {
                    NO_URL.to_string()
                } else {
                    doc.document_url
                },
            })
            .collect();

        debug!("Retrieved {} references for query", references.len());
        references
    }
}
