//! Sampled (discrete-time) hold.
//!
//! The held value lives in discrete state group 0 and only changes at the
//! hold's periodic update events, so the output never feeds through.

use hf_framework::{
    DiscreteUpdate, Event, EvalResult, InputPorts, LeafContext, LeafSystem, PeriodicEvent,
    PortSpec, Value,
};
use nalgebra::DVector;

use crate::error::PrimitiveResult;

/// Zero-order hold: samples `u` every `period` seconds, holds it on `y`.
pub struct ZeroOrderHold {
    name: String,
    event: PeriodicEvent,
    initial: DVector<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl ZeroOrderHold {
    pub fn new(name: impl Into<String>, period: f64, initial: &[f64]) -> PrimitiveResult<Self> {
        Ok(Self {
            name: name.into(),
            event: PeriodicEvent::discrete_update(period)?,
            initial: DVector::from_column_slice(initial),
            inputs: vec![PortSpec::vector("u", initial.len())],
            outputs: vec![PortSpec::vector("y", initial.len())],
        })
    }

    pub fn period(&self) -> f64 {
        self.event.period
    }
}

impl LeafSystem for ZeroOrderHold {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn default_discrete_state(&self) -> Vec<DVector<f64>> {
        vec![self.initial.clone()]
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        vec![self.event]
    }

    fn has_direct_feedthrough(&self, _input: usize, _output: usize) -> bool {
        false
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(ctx.discrete_state(0)?.clone()))
    }

    fn calc_discrete_update(
        &self,
        _ctx: &LeafContext<'_>,
        inputs: &InputPorts<'_>,
        _event: &Event,
        update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        *update.group_mut(0)? = inputs.vector(0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::{EventKind, System};

    #[test]
    fn hold_latches_input_on_update() {
        let zoh = ZeroOrderHold::new("zoh", 0.1, &[0.0]).unwrap();
        assert_eq!(zoh.period(), 0.1);
        let system = System::leaf(zoh);
        let mut ctx = system.create_default_context();
        system.fix_input_port(&mut ctx, 0, Value::from_slice(&[5.0])).unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[0.0]));

        let decls = system.periodic_events();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].event.kind, EventKind::DiscreteUpdate);
        let event = Event::periodic(&decls[0], 0.1);
        let update = system.compute_discrete_update(&ctx, &event).unwrap();
        ctx.apply_discrete_update(event.owner, update).unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[5.0]));
    }

    #[test]
    fn hold_rejects_bad_period() {
        assert!(ZeroOrderHold::new("zoh", 0.0, &[0.0]).is_err());
    }
}
