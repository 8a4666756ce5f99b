//! The capability set implemented by every leaf system.

use nalgebra::DVector;

use crate::context::{DiscreteUpdate, LeafContext};
use crate::error::{EvalError, EvalResult};
use crate::evaluate::InputPorts;
use crate::event::{Event, PeriodicEvent};
use crate::port::{PortDirection, PortSpec};
use crate::value::Value;

/// A primitive unit of computation over its own context record.
///
/// Leaves never hold references to other systems. Everything they need from
/// the rest of the diagram arrives through `InputPorts`, which pulls upstream
/// outputs on demand.
///
/// Leaves are `Send + Sync` so a finished system can be evaluated from worker
/// threads, each with its own context clone.
pub trait LeafSystem: Send + Sync {
    fn name(&self) -> &str;

    fn input_ports(&self) -> &[PortSpec] {
        &[]
    }

    fn output_ports(&self) -> &[PortSpec] {
        &[]
    }

    fn continuous_state_size(&self) -> usize {
        0
    }

    fn default_continuous_state(&self) -> DVector<f64> {
        DVector::zeros(self.continuous_state_size())
    }

    /// Initial discrete state, one vector per group.
    fn default_discrete_state(&self) -> Vec<DVector<f64>> {
        Vec::new()
    }

    fn default_abstract_state(&self) -> Vec<Value> {
        Vec::new()
    }

    fn default_parameters(&self) -> Vec<Value> {
        Vec::new()
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        Vec::new()
    }

    /// Whether `output` depends on `input` at the same instant.
    ///
    /// Conservative default: every output depends on every input.
    fn has_direct_feedthrough(&self, _input: usize, _output: usize) -> bool {
        true
    }

    fn calc_output(
        &self,
        _ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        port: usize,
    ) -> EvalResult<Value> {
        Err(EvalError::PortOutOfRange {
            system: self.name().to_string(),
            direction: PortDirection::Output,
            index: port,
            count: self.output_ports().len(),
        })
    }

    fn calc_time_derivatives(
        &self,
        _ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
    ) -> EvalResult<DVector<f64>> {
        Ok(DVector::zeros(self.continuous_state_size()))
    }

    /// Compute the post-event discrete state into `update`.
    ///
    /// `update` starts as a copy of the current state. The context is the
    /// pre-update snapshot shared by every update at this instant.
    fn calc_discrete_update(
        &self,
        _ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        _event: &Event,
        _update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        Ok(())
    }

    /// Observe the current state. Must not change simulation numbers.
    fn publish(
        &self,
        _ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        _event: &Event,
    ) -> EvalResult<()> {
        Ok(())
    }

    /// Hook run once by the simulator before the first events at `t0`.
    fn initialize(
        &self,
        _ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        _update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        Ok(())
    }
}
