//! Error types for model loading.

use std::path::PathBuf;

use hf_core::HfError;
use hf_primitives::PrimitiveError;
use thiserror::Error;

/// Errors raised while turning a model description into a system.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read model file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid model: {what}")]
    Invalid { what: String },
}

pub type LoadResult<T> = Result<T, LoadError>;

impl From<HfError> for LoadError {
    fn from(e: HfError) -> Self {
        LoadError::Invalid { what: e.to_string() }
    }
}

impl From<PrimitiveError> for LoadError {
    fn from(e: PrimitiveError) -> Self {
        LoadError::Invalid { what: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LoadError::Io {
            path: PathBuf::from("/no/such/model.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let text = err.to_string();
        assert!(text.contains("/no/such/model.yaml"));
        assert!(text.contains("missing"));
    }

    #[test]
    fn error_conversion() {
        let err: LoadError = HfError::InvalidArg { what: "mass" }.into();
        assert!(matches!(err, LoadError::Invalid { what } if what.contains("mass")));
    }
}
