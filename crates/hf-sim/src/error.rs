//! Error types for simulation operations.

use hf_core::HfError;
use hf_framework::EvalError;
use thiserror::Error;

/// Errors encountered while driving a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Simulator is faulted; call initialize() before advancing again")]
    Faulted,

    #[error("Non-finite continuous state at t = {time}")]
    NonFiniteState { time: f64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Core(#[from] HfError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<serde_yaml::Error> for SimError {
    fn from(e: serde_yaml::Error) -> Self {
        SimError::Config {
            message: e.to_string(),
        }
    }
}
