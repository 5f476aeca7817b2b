use thiserror::Error;

pub type Result<T> = std::result::Result<T, AskdocsError>;

#[derive(Error, Debug)]
pub enum AskdocsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Document analysis error: {0}")]
    Analysis(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User does not own session {session_id}")]
    SessionOwnership { session_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AskdocsError {
    /// HTTP status code an enclosing request layer should map this error onto.
    #[inline]
    pub fn status_code(&self) -> u16 {
        match *self {
            AskdocsError::InvalidRequest(_) => 400,
            AskdocsError::SessionOwnership { .. } => 403,
            _ => 500,
        }
    }
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod ingest;
