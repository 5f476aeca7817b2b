pub mod analyzer;

#[cfg(test)]
mod tests;

use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::database::lancedb::{DocumentRecord, VectorIndex};
use crate::embeddings::Embedder;
use crate::ingest::analyzer::DocumentAnalyzer;
use crate::{AskdocsError, Result};

/// Replace every character outside `[a-zA-Z0-9_\-=]` with an underscore.
/// Pure and idempotent, so re-ingesting a document always derives the same
/// record identifier.
#[inline]
pub fn sanitize_document_id(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Extract the file name from a document URL's path.
#[inline]
pub fn document_name_from_url(document_url: &str) -> Result<String> {
    let url = Url::parse(document_url)
        .map_err(|e| AskdocsError::InvalidRequest(format!("Invalid document URL: {}", e)))?;

    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    Ok(name.to_string())
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Records actually derived and written to the index.
    pub records: Vec<DocumentRecord>,
    /// Analyzed documents skipped because they had no usable field text.
    pub skipped: usize,
}

/// Runs the ingestion pipeline for one source document: analyze, derive
/// field text, embed, and upsert into the vector index. Analysis and
/// embedding failures abort the run; an unacknowledged index write is
/// logged and the record still counts as processed.
pub struct IngestOrchestrator {
    analyzer: Arc<dyn DocumentAnalyzer>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl IngestOrchestrator {
    #[inline]
    pub fn new(
        analyzer: Arc<dyn DocumentAnalyzer>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            analyzer,
            embedder,
            index,
        }
    }

    #[inline]
    pub async fn ingest(&self, document_url: &str) -> Result<IngestReport> {
        let document_name = document_name_from_url(document_url)?;

        info!("Analyzing document {}", document_url);
        let analysis = self
            .analyzer
            .analyze(document_url)
            .map_err(|e| AskdocsError::Analysis(format!("{:#}", e)))?;

        let mut records = Vec::new();
        let mut skipped = 0;

        for document in &analysis.documents {
            // Fields without a value contribute nothing to the indexed text.
            let content = document
                .fields
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .as_ref()
                        .filter(|v| !v.trim().is_empty())
                        .map(|v| format!("{}: {}", name, v))
                })
                .collect::<Vec<String>>()
                .join(" ");

            if content.is_empty() {
                debug!(
                    "Skipping {} document with no extracted field text",
                    document.doc_type
                );
                skipped += 1;
                continue;
            }

            let vector = self
                .embedder
                .embed(&content)
                .map_err(|e| AskdocsError::Embedding(format!("{:#}", e)))?;

            let raw_id = format!(
                "{}_{}_{}",
                document_name, document.doc_type, document.confidence
            );
            let record = DocumentRecord {
                id: sanitize_document_id(&raw_id),
                document_type: document.doc_type.clone(),
                confidence: document.confidence,
                content,
                vector,
                document_url: document_url.to_string(),
            };

            let acknowledged = self
                .index
                .upsert(&record)
                .await
                .context("Failed to store document record")?;
            if !acknowledged {
                warn!("Index did not acknowledge write for record {}", record.id);
            }

            records.push(record);
        }

        info!(
            "Ingested {} record(s) from {} ({} skipped)",
            records.len(),
            document_url,
            skipped
        );

        Ok(IngestReport { records, skipped })
    }
}
