pub mod prompt;
pub mod rechunk;
pub mod retriever;
pub mod session;
pub mod stream;

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::AskdocsError;
use crate::chat::rechunk::{Frame, Rechunker};
use crate::chat::retriever::ContextRetriever;
use crate::chat::session::{Role, SessionCoordinator};
use crate::chat::stream::FragmentStream;
use crate::generation::ChatStreamer;

/// One incoming chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: Option<String>,
    pub message: String,
}

/// What a completed turn produced, for callers that want the final state
/// after the frames have been delivered.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub answer: String,
}

/// Frame delivery seam. The pipeline pushes frames here as they are
/// produced; the sink owns transport formatting.
pub trait FrameSink {
    fn send(&mut self, frame: &Frame) -> Result<()>;
}

/// Writes frames as server-sent events, flushing after each one so clients
/// see deltas as they happen.
pub struct SseWriter<W: Write> {
    writer: W,
}

impl<W: Write> SseWriter<W> {
    #[inline]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> FrameSink for SseWriter<W> {
    #[inline]
    fn send(&mut self, frame: &Frame) -> Result<()> {
        self.writer
            .write_all(frame.to_sse()?.as_bytes())
            .context("Failed to write frame")?;
        self.writer.flush().context("Failed to flush frame")?;
        Ok(())
    }
}

/// Orchestrates one chat turn end to end: session resolution, best-effort
/// retrieval, prompt composition, streamed generation, re-chunked delivery,
/// and persistence of both turns.
pub struct ChatPipeline {
    coordinator: SessionCoordinator,
    retriever: ContextRetriever,
    streamer: Arc<dyn ChatStreamer>,
}

impl ChatPipeline {
    #[inline]
    pub fn new(
        coordinator: SessionCoordinator,
        retriever: ContextRetriever,
        streamer: Arc<dyn ChatStreamer>,
    ) -> Self {
        Self {
            coordinator,
            retriever,
            streamer,
        }
    }

    /// Run one turn, pushing frames into `sink` as they are produced.
    ///
    /// Validation and session-ownership failures return before any frame is
    /// sent. Once streaming starts, faults are delivered in-band as error
    /// frames and the stream still terminates with a done frame.
    #[inline]
    pub async fn run(
        &self,
        request: &ChatRequest,
        sink: &mut dyn FrameSink,
    ) -> crate::Result<ChatOutcome> {
        if request.user_id.trim().is_empty() || request.message.trim().is_empty() {
            return Err(AskdocsError::InvalidRequest(
                "Both 'user_id' and 'message' are required fields.".to_string(),
            ));
        }

        let mut session = self
            .coordinator
            .resolve(&request.user_id, request.session_id.as_deref())
            .await?;
        session.append_turn(Role::User, &request.message);

        sink.send(&Frame::info(
            "Message received, generating response...".to_string(),
            session.id.clone(),
        ))?;

        let references = self.retriever.retrieve(&request.message).await;
        debug!(
            "Running turn for session {} with {} references",
            session.id,
            references.len()
        );

        let system_prompt = prompt::compose_system_prompt(&request.message, &references)?;
        let fragments = FragmentStream::open(
            self.streamer.as_ref(),
            &system_prompt,
            &request.message,
            &references,
        );

        let mut rechunker = Rechunker::new(fragments);
        for frame in &mut rechunker {
            sink.send(&frame)?;
        }

        let answer = rechunker.into_answer();
        session.append_turn(Role::Assistant, &answer);
        for reference in &references {
            if reference.has_url() && !session.reference_urls.contains(&reference.url) {
                session.reference_urls.push(reference.url.clone());
            }
        }

        // The response has already been streamed; a persistence fault must
        // not turn a delivered answer into a client-visible failure.
        if let Err(e) = self.coordinator.persist(&session).await {
            warn!("Failed to persist session {}: {:#}", session.id, e);
        } else {
            info!("Persisted session {} ({} turns)", session.id, session.turns.len());
        }

        Ok(ChatOutcome {
            session_id: session.id,
            answer,
        })
    }
}
