//! CLI error type: every library error, one line each.

use std::path::PathBuf;

use hf_core::HfError;
use hf_framework::{BuildError, EvalError};
use hf_messaging::TransportError;
use hf_models::LoadError;
use hf_primitives::PrimitiveError;
use hf_sim::{SimError, SimulatorState};
use hf_trajopt::{SolutionResult, TrajOptError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("No solution found ({0:?})")]
    NoSolution(SolutionResult),

    #[error("Simulation ended in state {0:?}")]
    Unfinished(SimulatorState),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    TrajOpt(#[from] TrajOptError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    #[error(transparent)]
    Core(#[from] HfError),
}

pub type CliResult<T> = Result<T, CliError>;

pub fn read_file(path: &std::path::Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
