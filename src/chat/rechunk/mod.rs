#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::chat::stream::Fragment;

/// Wire frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Chunk,
    References,
    Error,
    Info,
    Done,
}

/// One server-sent-event payload on the chat stream. Optional fields are
/// omitted from the JSON entirely when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    #[inline]
    pub fn chunk(content: String, references: Option<Vec<String>>) -> Self {
        Self {
            kind: FrameKind::Chunk,
            content: Some(content),
            session_id: None,
            references,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn references(content: String, references: Vec<String>) -> Self {
        Self {
            kind: FrameKind::References,
            content: Some(content),
            session_id: None,
            references: Some(references),
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn error(message: String) -> Self {
        Self {
            kind: FrameKind::Error,
            content: Some(message),
            session_id: None,
            references: None,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn info(message: String, session_id: String) -> Self {
        Self {
            kind: FrameKind::Info,
            content: Some(message),
            session_id: Some(session_id),
            references: None,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn done() -> Self {
        Self {
            kind: FrameKind::Done,
            content: None,
            session_id: None,
            references: None,
            timestamp: Utc::now(),
        }
    }

    /// Encode as one server-sent event.
    #[inline]
    pub fn to_sse(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize frame")?;
        Ok(format!("data: {}\n\n", json))
    }
}

/// Number of buffered words that forces a chunk flush.
const FLUSH_WORD_COUNT: usize = 5;

/// Sentence punctuation that forces a chunk flush when present in a delta.
const FLUSH_PUNCTUATION: [char; 4] = ['.', '!', '?', '\n'];

/// Re-chunks a fragment stream into wire frames for smoother delivery.
/// Content deltas accumulate in a buffer that flushes once it holds enough
/// words or the incoming delta carries sentence punctuation. The buffer is
/// always flushed before a references or error frame so frame order matches
/// content order, and a single done frame terminates the stream, error or
/// not. No content is ever dropped.
pub struct Rechunker<I> {
    fragments: I,
    buffer: String,
    word_count: usize,
    current_refs: Vec<String>,
    answer: String,
    pending: VecDeque<Frame>,
    done_emitted: bool,
}

impl<I> Rechunker<I>
where
    I: Iterator<Item = Fragment>,
{
    #[inline]
    pub fn new(fragments: I) -> Self {
        Self {
            fragments,
            buffer: String::new(),
            word_count: 0,
            current_refs: Vec::new(),
            answer: String::new(),
            pending: VecDeque::new(),
            done_emitted: false,
        }
    }

    /// The accumulated response text, excluding the citation block. This is
    /// what gets persisted as the assistant turn.
    #[inline]
    pub fn into_answer(self) -> String {
        self.answer
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.buffer);
        self.word_count = 0;
        let references = if self.current_refs.is_empty() {
            None
        } else {
            Some(self.current_refs.clone())
        };
        self.pending.push_back(Frame::chunk(content, references));
    }

    fn finish(&mut self) {
        self.flush_buffer();
        self.pending.push_back(Frame::done());
        self.done_emitted = true;
    }
}

impl<I> Iterator for Rechunker<I>
where
    I: Iterator<Item = Fragment>,
{
    type Item = Frame;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.done_emitted {
                return None;
            }

            match self.fragments.next() {
                Some(Fragment::Content { text, references }) => {
                    self.answer.push_str(&text);
                    self.buffer.push_str(&text);
                    self.word_count += text.split_whitespace().count();
                    self.current_refs = references;

                    if self.word_count >= FLUSH_WORD_COUNT
                        || text.contains(FLUSH_PUNCTUATION)
                    {
                        self.flush_buffer();
                    }
                }
                Some(Fragment::References { text, references }) => {
                    self.flush_buffer();
                    self.pending.push_back(Frame::references(text, references));
                }
                Some(Fragment::Error { message }) => {
                    // The fragment stream is fused after a fault; close out
                    // now so the done frame still arrives last.
                    self.flush_buffer();
                    self.pending.push_back(Frame::error(message));
                    self.pending.push_back(Frame::done());
                    self.done_emitted = true;
                }
                None => self.finish(),
            }
        }
    }
}
