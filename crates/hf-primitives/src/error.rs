//! Error types for block construction.

use hf_core::HfError;
use thiserror::Error;

/// Result type for block construction.
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;

/// Invalid block configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrimitiveError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Core(#[from] HfError),
}
