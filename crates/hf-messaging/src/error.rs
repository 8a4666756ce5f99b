//! Error types for message transport.

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Message on '{topic}' has {actual} values, expected {expected}")]
    Width {
        topic: String,
        expected: usize,
        actual: usize,
    },

    #[error("Transport rejected message on '{topic}': {message}")]
    Rejected { topic: String, message: String },
}
