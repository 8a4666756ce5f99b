//! Error types for trajectory optimization.

use hf_core::HfError;
use hf_framework::EvalError;
use thiserror::Error;

use crate::nlp::SolutionResult;

/// Errors raised while setting up or using an optimization.
///
/// A solver run that ends without a solution is not an error: it is reported
/// as a `SolutionResult`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajOptError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Dynamics evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Trajectory duration {duration} is outside [{t_min}, {t_max}]")]
    BoundsViolation { duration: f64, t_min: f64, t_max: f64 },

    #[error("No solution available (solver outcome: {outcome:?})")]
    NoSolution { outcome: Option<SolutionResult> },

    #[error("Invalid trajectory: {what}")]
    InvalidTrajectory { what: String },

    #[error(transparent)]
    Core(#[from] HfError),
}

pub type TrajOptResult<T> = Result<T, TrajOptError>;

impl TrajOptError {
    pub(crate) fn setup(what: impl Into<String>) -> Self {
        TrajOptError::ProblemSetup { what: what.into() }
    }
}
