//! Point mass on a line driven by a force.

use hf_core::units::{Mass, kg};
use hf_core::{HfError, HfResult};
use hf_framework::{EvalResult, InputPorts, LeafContext, LeafSystem, PortSpec, Value};
use nalgebra::DVector;

/// State `[q, qdot]`, input `force`, `qddot = force / mass`.
pub struct DoubleIntegrator {
    name: String,
    mass: Mass,
    initial: DVector<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl DoubleIntegrator {
    pub fn new(name: impl Into<String>, mass: Mass) -> HfResult<Self> {
        if !(mass.value.is_finite() && mass.value > 0.0) {
            return Err(HfError::InvalidArg {
                what: "double integrator mass must be positive",
            });
        }
        Ok(Self::with_mass(name.into(), mass))
    }

    /// Unit mass.
    pub fn unit(name: impl Into<String>) -> Self {
        Self::with_mass(name.into(), kg(1.0))
    }

    fn with_mass(name: String, mass: Mass) -> Self {
        Self {
            name,
            mass,
            initial: DVector::zeros(2),
            inputs: vec![PortSpec::vector("force", 1)],
            outputs: vec![PortSpec::vector("state", 2)],
        }
    }

    pub fn with_initial_state(mut self, q: f64, qdot: f64) -> HfResult<Self> {
        hf_core::ensure_all_finite(&[q, qdot], "double integrator initial state")?;
        self.initial = DVector::from_column_slice(&[q, qdot]);
        Ok(self)
    }

    pub fn mass(&self) -> Mass {
        self.mass
    }
}

impl LeafSystem for DoubleIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn continuous_state_size(&self) -> usize {
        2
    }

    fn default_continuous_state(&self) -> DVector<f64> {
        self.initial.clone()
    }

    fn has_direct_feedthrough(&self, _input: usize, _output: usize) -> bool {
        false
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(ctx.continuous_state().clone()))
    }

    fn calc_time_derivatives(&self, ctx: &LeafContext<'_>, inputs: &InputPorts<'_>) -> EvalResult<DVector<f64>> {
        let x = ctx.continuous_state();
        let force = inputs.vector(0)?[0];
        Ok(DVector::from_column_slice(&[x[1], force / self.mass.value]))
    }
}
