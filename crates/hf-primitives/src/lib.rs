//! Reusable leaf systems for hybridflow diagrams.
//!
//! - Sources: constant vectors and constant abstract values
//! - Math: scalar and matrix gains, multiplexer, demultiplexer
//! - Continuous: integrator, linear state-space system
//! - Sampled: zero-order hold and a PI controller with anti-windup
//!
//! Every block validates its configuration at construction, so a block that
//! exists always has consistent port widths.

pub mod continuous;
pub mod controller;
pub mod error;
pub mod math;
pub mod sampled;
pub mod source;

pub use continuous::{Integrator, LinearSystem};
pub use controller::{PiController, PiGains};
pub use error::{PrimitiveError, PrimitiveResult};
pub use math::{Demultiplexer, Gain, MatrixGain, Multiplexer};
pub use sampled::ZeroOrderHold;
pub use source::{ConstantValueSource, ConstantVectorSource};
