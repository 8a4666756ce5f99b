//! hf-core: shared foundation for hybridflow.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact handles for systems in a diagram)
//! - units (uom SI types used by plant parameters)
//! - error (shared error type)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{HfError, HfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
