//! hf-sim: drives a system's root context forward in time.
//!
//! Provides:
//! - Fixed-step integrators (RK4, forward Euler) over the flat continuous state
//! - The periodic event schedule (discrete updates before publishes, then add order)
//! - The `Simulator` state machine with atomic interval commits
//! - Wall-clock pacing policies

pub mod config;
pub mod error;
pub mod integrator;
pub mod pacing;
pub mod schedule;
pub mod simulator;

pub use config::SimulatorConfig;
pub use error::{SimError, SimResult};
pub use integrator::{ContinuousModel, ForwardEuler, Integrator, IntegratorType, RK4};
pub use pacing::{NoPacing, PaceOutcome, Pacer, RealtimePacer};
pub use schedule::EventSchedule;
pub use simulator::{Simulator, SimulatorState, SimulatorStats};
