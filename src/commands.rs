use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::chat::retriever::ContextRetriever;
use crate::chat::session::SessionCoordinator;
use crate::chat::{ChatPipeline, ChatRequest, SseWriter};
use crate::config::{Config, get_config_dir};
use crate::database::lancedb::{SharedVectorStore, VectorStore};
use crate::database::sqlite::Database;
use crate::embeddings::EmbeddingClient;
use crate::generation::GenerationClient;
use crate::ingest::IngestOrchestrator;
use crate::ingest::analyzer::AnalyzerClient;

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(config_dir)
}

async fn open_session_coordinator(config: &Config) -> Result<SessionCoordinator> {
    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize session database")?;
    Ok(SessionCoordinator::new(
        Arc::new(database),
        config.session.expiration_hours,
    ))
}

async fn open_vector_index(config: &Config) -> Result<Arc<SharedVectorStore>> {
    let store = VectorStore::new(&config.vector_database_path())
        .await
        .context("Failed to open vector index")?;
    Ok(Arc::new(SharedVectorStore::new(store)))
}

/// Run one chat turn, streaming SSE frames to stdout.
#[inline]
pub async fn chat(user: String, session: Option<String>, message: String) -> Result<()> {
    let config = load_config()?;

    let coordinator = open_session_coordinator(&config).await?;
    let index = open_vector_index(&config).await?;
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let retriever = ContextRetriever::new(
        embedder,
        index,
        config.retrieval.top_k,
        config.retrieval.enabled,
    );
    let streamer = Arc::new(GenerationClient::new(&config.generation)?);

    let pipeline = ChatPipeline::new(coordinator, retriever, streamer);
    let request = ChatRequest {
        user_id: user,
        session_id: session,
        message,
    };

    let stdout = std::io::stdout();
    let mut sink = SseWriter::new(stdout.lock());
    let outcome = pipeline.run(&request, &mut sink).await?;

    info!("Turn completed for session {}", outcome.session_id);
    Ok(())
}

/// Print the turn log for a user's session (latest session when no id is
/// given). Expired or foreign sessions read as absent.
#[inline]
pub async fn history(user: String, session: Option<String>) -> Result<()> {
    let config = load_config()?;
    let coordinator = open_session_coordinator(&config).await?;

    let Some(found) = coordinator.find_active(&user, session.as_deref()).await? else {
        println!("No active session found.");
        return Ok(());
    };

    println!("Session: {}", found.id);
    println!("Last interaction: {}", found.last_interaction);
    println!();

    for turn in &found.turns {
        println!("[{}] {}", turn.role.as_str(), turn.content);
    }

    if !found.reference_urls.is_empty() {
        println!();
        println!("References:");
        for url in &found.reference_urls {
            println!("  {}", url);
        }
    }

    Ok(())
}

/// Analyze and index one document, printing the run report as JSON.
#[inline]
pub async fn ingest(document_url: String) -> Result<()> {
    let config = load_config()?;

    let analyzer = Arc::new(AnalyzerClient::new(&config.analyzer)?);
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let index = open_vector_index(&config).await?;

    let orchestrator = IngestOrchestrator::new(analyzer, embedder, index);
    let report = orchestrator.ingest(&document_url).await?;

    // Embedding vectors are omitted from the report output.
    let documents: Vec<serde_json::Value> = report
        .records
        .iter()
        .map(|record| {
            serde_json::json!({
                "id": record.id,
                "document_type": record.document_type,
                "confidence": record.confidence,
                "content": record.content,
                "document_url": record.document_url,
            })
        })
        .collect();

    let output = serde_json::json!({
        "status": "success",
        "documents": documents,
        "skipped": report.skipped,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Write a default config file if none exists yet and report where it lives.
#[inline]
pub fn init_config() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    config.save()?;

    println!("Configuration written to {}", config_dir.join("config.toml").display());
    Ok(())
}
