use super::*;
use crate::database::lancedb::{DocumentRecord, IndexedDocument};
use anyhow::Result;
use async_trait::async_trait;

struct FixedEmbedder {
    fail: bool,
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            anyhow::bail!("embedding backend unavailable");
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

struct FixedIndex {
    hits: Vec<IndexedDocument>,
    fail: bool,
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn upsert(&self, _record: &DocumentRecord) -> Result<bool> {
        Ok(true)
    }

    async fn search(&self, _query_vector: &[f32], _top_k: usize) -> Result<Vec<IndexedDocument>> {
        if self.fail {
            anyhow::bail!("index unavailable");
        }
        Ok(self.hits.clone())
    }
}

fn hit(id: &str, content: &str, url: &str) -> IndexedDocument {
    IndexedDocument {
        id: id.to_string(),
        document_type: "invoice".to_string(),
        content: content.to_string(),
        document_url: url.to_string(),
        similarity_score: 0.9,
    }
}

fn retriever(embedder: FixedEmbedder, index: FixedIndex, enabled: bool) -> ContextRetriever {
    ContextRetriever::new(Arc::new(embedder), Arc::new(index), 3, enabled)
}

#[tokio::test]
async fn returns_hits_as_references() {
    let index = FixedIndex {
        hits: vec![hit("doc-1", "total: 42", "https://example.com/doc.pdf")],
        fail: false,
    };
    let retriever = retriever(FixedEmbedder { fail: false }, index, true);

    let references = retriever.retrieve("what is the total?").await;

    assert_eq!(references.len(), 1);
    assert_eq!(references[0].url, "https://example.com/doc.pdf");
    assert!(references[0].has_url());
}

#[tokio::test]
async fn empty_content_hits_are_dropped_and_missing_urls_defaulted() {
    let index = FixedIndex {
        hits: vec![hit("doc-1", "   ", "https://example.com/a"), hit("doc-2", "text", "")],
        fail: false,
    };
    let retriever = retriever(FixedEmbedder { fail: false }, index, true);

    let references = retriever.retrieve("query").await;

    assert_eq!(references.len(), 1);
    assert_eq!(references[0].url, NO_URL);
    assert!(!references[0].has_url());
}

#[tokio::test]
async fn embedding_failure_degrades_to_empty() {
    let index = FixedIndex {
        hits: vec![hit("doc-1", "text", "https://example.com/a")],
        fail: false,
    };
    let retriever = retriever(FixedEmbedder { fail: true }, index, true);

    assert!(retriever.retrieve("query").await.is_empty());
}

#[tokio::test]
async fn search_failure_degrades_to_empty() {
    let index = FixedIndex {
        hits: Vec::new(),
        fail: true,
    };
    let retriever = retriever(FixedEmbedder { fail: false }, index, true);

    assert!(retriever.retrieve("query").await.is_empty());
}

#[tokio::test]
async fn disabled_retrieval_skips_lookup() {
    // The embedder would fail if called; disabled retrieval must not reach it.
    let index = FixedIndex {
        hits: Vec::new(),
        fail: true,
    };
    let retriever = retriever(FixedEmbedder { fail: true }, index, false);

    assert!(retriever.retrieve("query").await.is_empty());
}
