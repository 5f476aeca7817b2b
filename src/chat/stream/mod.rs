
use tracing::warn;

use crate::chat::retriever::Reference;
use crate::generation::ChatStreamer;

/// One logical event produced while generating a response. Fragments are the
/// lossless, un-chunked form; re-chunking into wire frames happens downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Incremental response text straight from the generation backend.
    Content {
        text: String,
        references: Vec<String>,
    },
    /// The trailing citation block, emitted once after the last delta.
    References {
        text: String,
        references: Vec<String>,
    },
    /// A stream fault. Terminal; no further content follows.
    Error { message: String },
}

enum StreamState {
    /// Setup failed before any delta; emit one error fragment and stop.
    Failed(String),
    Streaming,
    Finished,
}

/// Adapts a raw delta stream into fragments: content per delta, one optional
/// references trailer, and faults folded into a single terminal error
/// fragment. Never yields anything after an error.
pub struct FragmentStream {
    deltas: Option<Box<dyn Iterator<Item = anyhow::Result<String>> + Send>>,
    valid_refs: Vec<String>,
    state: StreamState,
}

impl FragmentStream {
    /// Open a generation stream for the composed prompt. A setup failure is
    /// absorbed into the stream itself so callers see it as an error
    /// fragment rather than an early return.
    #[inline]
    pub fn open(
        streamer: &dyn ChatStreamer,
        system_prompt: &str,
        user_message: &str,
        references: &[Reference],
    ) -> Self {
        let valid_refs: Vec<String> = references
            .iter()
            .filter(|reference| reference.has_url())
            .map(|reference| reference.url.clone())
            .collect();

        match streamer.open(system_prompt, user_message) {
            Ok(deltas) => Self {
                deltas: Some(deltas),
                valid_refs,
                state: StreamState::Streaming,
            },
            Err(e) => {
                warn!("Failed to open generation stream: {:#}", e);
                Self {
                    deltas: None,
                    valid_refs,
                    state: StreamState::Failed(fault_message(&e)),
                }
            }
        }
    }

    fn references_trailer(&self) -> Option<Fragment> {
        if self.valid_refs.is_empty() {
            return None;
        }

        let mut text = String::from("\n\nReferences:\n");
        for (i, url) in self.valid_refs.iter().enumerate() {
            text.push_str(&format!("[{}] {}\n", i + 1, url));
        }

        Some(Fragment::References {
            text,
            references: self.valid_refs.clone(),
        })
    }
}

fn fault_message(e: &anyhow::Error) -> String {
    format!("An error occurred while processing your request: {:#}", e)
}

impl Iterator for FragmentStream {
    type Item = Fragment;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &self.state {
            StreamState::Finished => None,
            StreamState::Failed(message) => {
                let fragment = Fragment::Error {
                    message: message.clone(),
                };
                self.state = StreamState::Finished;
                Some(fragment)
            }
            StreamState::Streaming => {
                match self.deltas.as_mut().and_then(Iterator::next) {
                    Some(Ok(text)) => Some(Fragment::Content {
                        text,
                        references: self.valid_refs.clone(),
                    }),
                    Some(Err(e)) => {
                        self.state = StreamState::Finished;
                        Some(Fragment::Error {
                            message: fault_message(&e),
                        })
                    }
                    None => {
                        self.state = StreamState::Finished;
                        // End of deltas; the citation block is the last
                        // fragment when any reference has a real URL.
                        self.references_trailer()
                    }
                }
            }
        }
    }
}
