//! Blocks with continuous state.

use hf_framework::{EvalResult, InputPorts, LeafContext, LeafSystem, PortSpec, Value};
use nalgebra::{DMatrix, DVector};

use crate::error::{PrimitiveError, PrimitiveResult};

/// xdot = u, y = x.
pub struct Integrator {
    name: String,
    initial: DVector<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl Integrator {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self::with_initial(name, &vec![0.0; width])
    }

    pub fn with_initial(name: impl Into<String>, initial: &[f64]) -> Self {
        Self {
            name: name.into(),
            initial: DVector::from_column_slice(initial),
            inputs: vec![PortSpec::vector("u", initial.len())],
            outputs: vec![PortSpec::vector("y", initial.len())],
        }
    }
}

impl LeafSystem for Integrator {
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
        self.initial.len()
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

    fn calc_time_derivatives(&self, _ctx: &LeafContext<'_>, inputs: &InputPorts<'_>) -> EvalResult<DVector<f64>> {
        inputs.vector(0)
    }
}

/// Continuous linear state-space system.
///
/// xdot = A x + B u, y = C x + D u. Output feeds through only when D is
/// nonzero.
pub struct LinearSystem {
    name: String,
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    initial: DVector<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl LinearSystem {
    pub fn new(
        name: impl Into<String>,
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        d: DMatrix<f64>,
    ) -> PrimitiveResult<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(PrimitiveError::DimensionMismatch {
                what: "A columns",
                expected: n,
                actual: a.ncols(),
            });
        }
        if b.nrows() != n {
            return Err(PrimitiveError::DimensionMismatch {
                what: "B rows",
                expected: n,
                actual: b.nrows(),
            });
        }
        if c.ncols() != n {
            return Err(PrimitiveError::DimensionMismatch {
                what: "C columns",
                expected: n,
                actual: c.ncols(),
            });
        }
        if d.nrows() != c.nrows() || d.ncols() != b.ncols() {
            return Err(PrimitiveError::DimensionMismatch {
                what: "D shape (rows of C by columns of B)",
                expected: c.nrows() * b.ncols(),
                actual: d.nrows() * d.ncols(),
            });
        }
        let all_finite = [&a, &b, &c, &d]
            .iter()
            .all(|m| m.iter().all(|v| v.is_finite()));
        if !all_finite {
            return Err(PrimitiveError::InvalidArg {
                what: "state-space matrices must be finite",
            });
        }
        let inputs = vec![PortSpec::vector("u", b.ncols())];
        let outputs = vec![PortSpec::vector("y", c.nrows())];
        Ok(Self {
            name: name.into(),
            initial: DVector::zeros(n),
            a,
            b,
            c,
            d,
            inputs,
            outputs,
        })
    }

    pub fn with_initial_state(mut self, x0: &[f64]) -> PrimitiveResult<Self> {
        if x0.len() != self.initial.len() {
            return Err(PrimitiveError::DimensionMismatch {
                what: "initial state",
                expected: self.initial.len(),
                actual: x0.len(),
            });
        }
        self.initial = DVector::from_column_slice(x0);
        Ok(self)
    }
}

impl LeafSystem for LinearSystem {
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
        self.initial.len()
    }

    fn default_continuous_state(&self) -> DVector<f64> {
        self.initial.clone()
    }

    fn has_direct_feedthrough(&self, _input: usize, _output: usize) -> bool {
        self.d.iter().any(|&v| v != 0.0)
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        let mut y = &self.c * ctx.continuous_state();
        if self.has_direct_feedthrough(0, 0) {
            y += &self.d * inputs.vector(0)?;
        }
        Ok(Value::Vector(y))
    }

    fn calc_time_derivatives(&self, ctx: &LeafContext<'_>, inputs: &InputPorts<'_>) -> EvalResult<DVector<f64>> {
        let u = inputs.vector(0)?;
        Ok(&self.a * ctx.continuous_state() + &self.b * u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hf_framework::System;

    #[test]
    fn integrator_has_no_feedthrough() {
        let system = System::leaf(Integrator::with_initial("i", &[1.0, 2.0]));
        assert!(!system.has_direct_feedthrough(0, 0));
        let mut ctx = system.create_default_context();
        // Output is available even before the input is fixed.
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[1.0, 2.0]));
        system
            .fix_input_port(&mut ctx, 0, Value::from_slice(&[0.5, -0.5]))
            .unwrap();
        let xdot = system.compute_time_derivatives(&ctx).unwrap();
        assert_eq!(xdot.as_slice(), &[0.5, -0.5]);
    }

    #[test]
    fn linear_system_derivatives_and_output() {
        // Double integrator: x = [q, v], u = force, y = q.
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let c = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let d = DMatrix::zeros(1, 1);
        let plant = LinearSystem::new("plant", a, b, c, d)
            .unwrap()
            .with_initial_state(&[3.0, 4.0])
            .unwrap();
        let system = System::leaf(plant);
        assert!(!system.has_direct_feedthrough(0, 0));

        let mut ctx = system.create_default_context();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[3.0]));
        system.fix_input_port(&mut ctx, 0, Value::from_slice(&[-1.0])).unwrap();
        let xdot = system.compute_time_derivatives(&ctx).unwrap();
        assert_eq!(xdot.as_slice(), &[4.0, -1.0]);
    }

    #[test]
    fn linear_system_rejects_bad_shapes() {
        let err = LinearSystem::new(
            "bad",
            DMatrix::zeros(2, 2),
            DMatrix::zeros(3, 1),
            DMatrix::zeros(1, 2),
            DMatrix::zeros(1, 1),
        );
        assert!(matches!(err, Err(PrimitiveError::DimensionMismatch { what: "B rows", .. })));
    }
}
