use super::*;
use crate::database::lancedb::IndexedDocument;
use crate::ingest::analyzer::{Analysis, AnalyzedDocument};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

struct FixedAnalyzer {
    analysis: anyhow::Result<Analysis>,
}

impl DocumentAnalyzer for FixedAnalyzer {
    fn analyze(&self, _document_url: &str) -> anyhow::Result<Analysis> {
        match &self.analysis {
            Ok(analysis) => Ok(analysis.clone()),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }
}

struct StubEmbedder {
    fail: bool,
}

impl Embedder for StubEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        if self.fail {
            anyhow::bail!("embedding backend unavailable");
        }
        Ok(vec![0.5; 4])
    }
}

#[derive(Default)]
struct RecordingIndex {
    records: Mutex<Vec<DocumentRecord>>,
    acknowledge: bool,
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn upsert(&self, record: &DocumentRecord) -> anyhow::Result<bool> {
        self.records.lock().unwrap().push(record.clone());
        Ok(self.acknowledge)
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _top_k: usize,
    ) -> anyhow::Result<Vec<IndexedDocument>> {
        Ok(Vec::new())
    }
}

fn document(doc_type: &str, fields: &[(&str, Option<&str>)]) -> AnalyzedDocument {
    AnalyzedDocument {
        doc_type: doc_type.to_string(),
        confidence: 0.95,
        fields: fields
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.map(str::to_string)))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn orchestrator(
    analysis: anyhow::Result<Analysis>,
    embed_fails: bool,
) -> (IngestOrchestrator, Arc<RecordingIndex>) {
    let index = Arc::new(RecordingIndex {
        records: Mutex::new(Vec::new()),
        acknowledge: true,
    });
    let orchestrator = IngestOrchestrator::new(
        Arc::new(FixedAnalyzer { analysis }),
        Arc::new(StubEmbedder { fail: embed_fails }),
        Arc::clone(&index) as Arc<dyn VectorIndex>,
    );
    (orchestrator, index)
}

#[test]
fn sanitize_replaces_disallowed_characters() {
    assert_eq!(
        sanitize_document_id("invoice.pdf_receipt_0.95"),
        "invoice_pdf_receipt_0_95"
    );
    assert_eq!(sanitize_document_id("a-b_c=d9"), "a-b_c=d9");
    assert_eq!(sanitize_document_id("naïve doc!"), "na__ve_doc_");
}

#[test]
fn sanitize_is_idempotent() {
    let once = sanitize_document_id("Contract (final) #2.pdf");
    assert_eq!(sanitize_document_id(&once), once);
}

#[test]
fn document_name_is_url_path_basename() {
    assert_eq!(
        document_name_from_url("https://example.com/docs/invoice.pdf?sig=abc").unwrap(),
        "invoice.pdf"
    );
    assert!(document_name_from_url("not a url").is_err());
}

#[tokio::test]
async fn ingest_derives_deterministic_records() {
    let analysis = Analysis {
        documents: vec![document(
            "invoice",
            &[
                ("total", Some("42.00")),
                ("vendor", Some("ACME")),
                ("notes", None),
            ],
        )],
    };
    let (orchestrator, index) = orchestrator(Ok(analysis), false);

    let report = orchestrator
        .ingest("https://example.com/docs/invoice.pdf")
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.skipped, 0);

    let record = &report.records[0];
    // Field order comes from the sorted field map, and null fields are
    // dropped from the text.
    assert_eq!(record.content, "total: 42.00 vendor: ACME");
    assert_eq!(record.id, "invoice_pdf_invoice_0_95");
    assert_eq!(record.document_url, "https://example.com/docs/invoice.pdf");
    assert_eq!(index.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn documents_without_field_text_are_skipped() {
    let analysis = Analysis {
        documents: vec![
            document("empty", &[("a", None), ("b", Some("  "))]),
            document("invoice", &[("total", Some("42.00"))]),
        ],
    };
    let (orchestrator, index) = orchestrator(Ok(analysis), false);

    let report = orchestrator
        .ingest("https://example.com/doc.pdf")
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(index.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn analysis_failure_aborts_the_run() {
    let (orchestrator, index) = orchestrator(Err(anyhow::anyhow!("service down")), false);

    let result = orchestrator.ingest("https://example.com/doc.pdf").await;

    assert!(matches!(result, Err(AskdocsError::Analysis(_))));
    assert!(index.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn embedding_failure_aborts_the_run() {
    let analysis = Analysis {
        documents: vec![document("invoice", &[("total", Some("42.00"))])],
    };
    let (orchestrator, _index) = orchestrator(Ok(analysis), true);

    let result = orchestrator.ingest("https://example.com/doc.pdf").await;

    assert!(matches!(result, Err(AskdocsError::Embedding(_))));
}

#[tokio::test]
async fn unacknowledged_write_still_counts() {
    let index = Arc::new(RecordingIndex {
        records: Mutex::new(Vec::new()),
        acknowledge: false,
    });
    let orchestrator = IngestOrchestrator::new(
        Arc::new(FixedAnalyzer {
            analysis: Ok(Analysis {
                documents: vec![document("invoice", &[("total", Some("42.00"))])],
            }),
        }),
        Arc::new(StubEmbedder { fail: false }),
        index,
    );

    let report = orchestrator
        .ingest("https://example.com/doc.pdf")
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
}
