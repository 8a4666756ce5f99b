//! hf-framework: systems, ports, contexts and diagrams.
//!
//! A [`System`] is either a leaf implementing [`LeafSystem`] or a [`Diagram`]
//! of child systems wired port to port. All mutable state lives in a
//! [`Context`] arena created from the system tree; systems themselves are
//! immutable once built.

pub mod builder;
pub mod context;
pub mod diagram;
pub mod error;
pub mod evaluate;
pub mod event;
pub mod leaf;
pub mod port;
pub mod system;
mod validate;
pub mod value;

pub use builder::DiagramBuilder;
pub use context::{Context, ContextRecord, DiscreteUpdate, LeafContext};
pub use diagram::{Diagram, InputSource};
pub use error::{BuildError, BuildResult, EvalError, EvalResult};
pub use evaluate::{Evaluator, InputPorts};
pub use event::{Event, EventDeclaration, EventKind, PeriodicEvent, TriggerType};
pub use leaf::LeafSystem;
pub use port::{InputPortRef, OutputPortRef, PortDirection, PortSpec};
pub use system::System;
pub use value::{Value, ValueKind};

pub use hf_core::SystemId;
