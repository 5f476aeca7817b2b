
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::GenerationConfig;

/// One role-tagged message sent to the generation backend.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Collaborator that opens a token-streaming chat completion. The returned
/// iterator yields one incremental text delta per backend chunk; chunks
/// without a delta are skipped inside the client.
pub trait ChatStreamer: Send + Sync {
    fn open(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<String>> + Send>>;
}

/// Client for an OpenAI-compatible streaming chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    base_url: Url,
    api_key: Option<String>,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    delta: CompletionDelta,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionDelta {
    content: Option<String>,
}

impl GenerationClient {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base_url = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid generation endpoint: {}", config.endpoint))?;

        // The global timeout bounds the whole streaming call, so it doubles
        // as the stream-duration limit. Hitting it surfaces as an IO error
        // mid-iteration, which downstream treats as a stream fault.
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.stream_timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            agent,
        })
    }

    /// Open a streaming chat completion for the given messages.
    #[inline]
    pub fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<CompletionStream> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };

        let url = Url::parse(&format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        ))
        .context("Failed to build chat completions URL")?;

        debug!("Opening streaming chat completion at {}", url);

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize completion request")?;

        let mut req = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", &format!("Bearer {}", key));
        }

        let response = req
            .send(&request_json)
            .context("Failed to open chat completion stream")?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(CompletionStream {
            reader: Box::new(reader),
            finished: false,
        })
    }
}

impl ChatStreamer for GenerationClient {
    #[inline]
    fn open(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<String>> + Send>> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user_message.to_string(),
            },
        ];
        Ok(Box::new(self.stream_chat(messages)?))
    }
}

/// Lazy single-pass iterator over the text deltas of one completion stream.
/// Parses server-sent-event lines of the form `data: {json}`, terminated by
/// `data: [DONE]` or end of body. Fuses after the first error.
pub struct CompletionStream {
    reader: Box<dyn BufRead + Send>,
    finished: bool,
}

impl CompletionStream {
    /// Wrap an arbitrary SSE byte stream. Used by tests to drive the parser
    /// without a live backend.
    #[inline]
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
            finished: false,
        }
    }

    fn next_delta(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read from completion stream")?;
            if read == 0 {
                // Stream ended without an explicit [DONE]; treat as normal
                // termination, matching backends that just close the body.
                return Ok(None);
            }

            let trimmed = line.trim();
            let Some(payload) = trimmed.strip_prefix("data:") else {
                // Blank keep-alive lines and comments between events.
                continue;
            };
            let payload = payload.trim();

            if payload == "[DONE]" {
                return Ok(None);
            }

            let chunk: CompletionChunk = serde_json::from_str(payload)
                .with_context(|| format!("Failed to parse completion chunk: {}", payload))?;

            let delta = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content);

            match delta {
                Some(content) if !content.is_empty() => return Ok(Some(content)),
                // A chunk without delta content means nothing to emit this
                // step, not an error.
                _ => {}
            }
        }
    }
}

impl Iterator for CompletionStream {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_delta() {
            Ok(Some(content)) => Some(Ok(content)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                warn!("Completion stream failed mid-iteration: {:#}", e);
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
