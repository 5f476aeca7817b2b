#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::AnalyzerConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Result of analyzing one source document. A single source can yield
/// several classified documents (a multi-page scan, for example).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Analysis {
    pub documents: Vec<AnalyzedDocument>,
}

/// One classified document with its extracted fields. Field order is kept
/// stable so derived text and identifiers are deterministic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyzedDocument {
    pub doc_type: String,
    pub confidence: f64,
    pub fields: BTreeMap<String, Option<String>>,
}

/// Document-analysis collaborator. Failure here aborts the ingestion run;
/// there is nothing to index without extraction results.
pub trait DocumentAnalyzer: Send + Sync {
    fn analyze(&self, document_url: &str) -> Result<Analysis>;
}

/// Client for an external document-analysis HTTP service.
#[derive(Debug, Clone)]
pub struct AnalyzerClient {
    base_url: Url,
    api_key: Option<String>,
    model_id: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest {
    model_id: String,
    document_url: String,
}

impl AnalyzerClient {
    #[inline]
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        if !config.is_configured() {
            anyhow::bail!("Document analyzer is not configured; set analyzer.endpoint and analyzer.model_id");
        }

        let base_url = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid analyzer endpoint: {}", config.endpoint))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            agent,
        })
    }
}

impl DocumentAnalyzer for AnalyzerClient {
    #[inline]
    fn analyze(&self, document_url: &str) -> Result<Analysis> {
        let request = AnalyzeRequest {
            model_id: self.model_id.clone(),
            document_url: document_url.to_string(),
        };

        // Url::join would drop a trailing path segment, so build the
        // endpoint path by hand.
        let url = Url::parse(&format!(
            "{}/analyze",
            self.base_url.as_str().trim_end_matches('/')
        ))
        .context("Failed to build analyzer URL")?;

        debug!("Analyzing document {} via {}", document_url, url);

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize analyze request")?;

        let mut req = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", &format!("Bearer {}", key));
        }

        let response_text = req
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .with_context(|| format!("Analysis request failed for {}", document_url))?;

        let analysis: Analysis =
            serde_json::from_str(&response_text).context("Failed to parse analysis response")?;

        debug!(
            "Analysis returned {} document(s) for {}",
            analysis.documents.len(),
            document_url
        );

        Ok(analysis)
    }
}
