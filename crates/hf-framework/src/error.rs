//! Error types for diagram construction and evaluation.

use hf_core::{HfError, SystemId};
use thiserror::Error;

use crate::port::PortDirection;
use crate::value::ValueKind;

pub type BuildResult<T> = Result<T, BuildError>;
pub type EvalResult<T> = Result<T, EvalError>;

/// Malformed topology. Always fatal to `build()`; nothing is partially applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Diagram '{diagram}' is already built")]
    AlreadyBuilt { diagram: String },

    #[error("System handle {system} is not part of this diagram")]
    UnknownSystem { system: SystemId },

    #[error("Diagram '{diagram}' cannot hold more systems")]
    TooManySystems { diagram: String },

    #[error("System '{system}' has no {direction} port {index} (it has {count})")]
    PortOutOfRange {
        system: String,
        direction: PortDirection,
        index: usize,
        count: usize,
    },

    #[error("System '{system}' has no {direction} port named '{name}'")]
    UnknownPortName {
        system: String,
        direction: PortDirection,
        name: String,
    },

    #[error("Cannot connect {output} output to {input} input ('{from}' -> '{to}')")]
    KindMismatch {
        from: String,
        to: String,
        output: ValueKind,
        input: ValueKind,
    },

    #[error("Input '{port}' of '{system}' is already connected or exported")]
    InputAlreadyConnected { system: String, port: String },

    #[error("Input '{port}' of '{system}' is not connected")]
    DisconnectedInput { system: String, port: String },

    #[error("Algebraic loop through: {}", systems.join(" -> "))]
    AlgebraicLoop { systems: Vec<String> },

    #[error("Duplicate exported {direction} port name '{name}'")]
    DuplicateExportName {
        direction: PortDirection,
        name: String,
    },
}

/// Failure while evaluating a system against a context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Input '{port}' of '{system}' is not connected and has no fixed value")]
    DisconnectedInput { system: String, port: String },

    #[error("Algebraic loop detected while evaluating output '{port}' of '{system}'")]
    AlgebraicLoop { system: String, port: String },

    #[error("Port '{port}' of '{system}' expected {expected}, got {actual}")]
    PortKindMismatch {
        system: String,
        port: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("System '{system}' has no {direction} port {index} (it has {count})")]
    PortOutOfRange {
        system: String,
        direction: PortDirection,
        index: usize,
        count: usize,
    },

    #[error("No system at context record {record}")]
    UnknownRecord { record: usize },

    #[error("Context has {actual} records but the system tree needs {expected}")]
    ContextMismatch { expected: usize, actual: usize },

    #[error("System '{system}' has no {what} {index}")]
    MissingState {
        system: String,
        what: &'static str,
        index: usize,
    },

    #[error("State size mismatch in '{system}': expected {expected}, got {actual}")]
    StateSize {
        system: String,
        expected: usize,
        actual: usize,
    },

    #[error("System '{system}' failed: {message}")]
    Domain { system: String, message: String },

    #[error(transparent)]
    Core(#[from] HfError),
}

impl EvalError {
    /// Domain error raised by a system's own computation.
    pub fn domain(system: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Domain {
            system: system.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_error_lists_systems() {
        let err = BuildError::AlgebraicLoop {
            systems: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Algebraic loop through: a -> b");
    }

    #[test]
    fn domain_error_display() {
        let err = EvalError::domain("plant", "singular mass matrix");
        assert!(err.to_string().contains("singular mass matrix"));
    }
}
