//! hf-models: dynamics providers for hybridflow.
//!
//! - [`AcrobotPlant`]: two-link underactuated arm with SI parameters
//! - [`DoubleIntegrator`]: point mass driven by a force
//! - [`YamlModelLoader`]: builds either of these, or a linear state-space
//!   system, from a YAML model file

pub mod acrobot;
pub mod double_integrator;
pub mod error;
pub mod loader;

pub use acrobot::{AcrobotParams, AcrobotPlant};
pub use double_integrator::DoubleIntegrator;
pub use error::{LoadError, LoadResult};
pub use loader::{ModelLoader, ModelSpec, YamlModelLoader};
