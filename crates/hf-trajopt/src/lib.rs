//! hf-trajopt: trajectory optimization by direct collocation.
//!
//! [`DirectCollocation`] transcribes a continuous-time [`hf_framework::System`]
//! into a nonlinear program solved by an augmented Lagrangian method
//! ([`nlp::solve`]). Solutions come back as [`PiecewisePolynomial`]s, which a
//! [`TrajectorySource`] can replay inside a simulation.

pub mod dircol;
pub mod error;
pub mod jacobian;
pub mod nlp;
pub mod source;
pub mod trajectory;

pub use dircol::DirectCollocation;
pub use error::{TrajOptError, TrajOptResult};
pub use jacobian::{finite_difference_jacobian, gradient_and_curvature};
pub use nlp::{NlpProblem, NlpSolution, SolutionResult, SolverOptions};
pub use source::{TrajectorySource, check_duration};
pub use trajectory::PiecewisePolynomial;
