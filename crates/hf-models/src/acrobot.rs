//! Two-link acrobot actuated at the elbow.
//!
//! ## Model
//!
//! State `x = [theta1, theta2, theta1dot, theta2dot]`, with `theta1` the
//! shoulder angle from the downward vertical and `theta2` the elbow angle
//! relative to link 1. The input is the elbow torque `tau`.
//!
//! ```text
//! M(q) qddot + C(q, qdot) qdot = tau_g(q) + B tau - b qdot,   B = [0, 1]^T
//! ```

use hf_core::units::{Accel, Inertia, Length, Mass, kg, kgm2, m, mps2};
use hf_core::{HfError, HfResult};
use hf_framework::{EvalError, EvalResult, InputPorts, LeafContext, LeafSystem, PortSpec, Value};
use nalgebra::{DVector, Matrix2, Vector2};

/// Physical parameters in SI units.
#[derive(Debug, Clone, PartialEq)]
pub struct AcrobotParams {
    pub m1: Mass,
    pub m2: Mass,
    pub l1: Length,
    /// Only used for drawing and reach; the dynamics need `lc2`.
    pub l2: Length,
    /// Distance from each joint to its link's center of mass.
    pub lc1: Length,
    pub lc2: Length,
    /// Inertia of each link about its center of mass.
    pub ic1: Inertia,
    pub ic2: Inertia,
    /// Viscous joint damping (N*m*s/rad).
    pub b1: f64,
    pub b2: f64,
    pub gravity: Accel,
}

impl Default for AcrobotParams {
    fn default() -> Self {
        Self {
            m1: kg(1.0),
            m2: kg(1.0),
            l1: m(1.0),
            l2: m(2.0),
            lc1: m(0.5),
            lc2: m(1.0),
            ic1: kgm2(0.083),
            ic2: kgm2(0.33),
            b1: 0.1,
            b2: 0.1,
            gravity: mps2(9.81),
        }
    }
}

impl AcrobotParams {
    pub fn validate(&self) -> HfResult<()> {
        let positive = [
            ("m1", self.m1.value),
            ("m2", self.m2.value),
            ("l1", self.l1.value),
            ("l2", self.l2.value),
            ("lc1", self.lc1.value),
            ("lc2", self.lc2.value),
            ("ic1", self.ic1.value),
            ("ic2", self.ic2.value),
        ];
        for (what, value) in positive {
            hf_core::ensure_finite(value, what)?;
            if value <= 0.0 {
                return Err(HfError::InvalidArg {
                    what: "acrobot masses, lengths and inertias must be positive",
                });
            }
        }
        for (what, value) in [("b1", self.b1), ("b2", self.b2), ("gravity", self.gravity.value)] {
            hf_core::ensure_finite(value, what)?;
        }
        if self.b1 < 0.0 || self.b2 < 0.0 {
            return Err(HfError::InvalidArg {
                what: "acrobot damping cannot be negative",
            });
        }
        Ok(())
    }
}

pub struct AcrobotPlant {
    name: String,
    params: AcrobotParams,
    initial: DVector<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl AcrobotPlant {
    pub fn new(name: impl Into<String>, params: AcrobotParams) -> HfResult<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            params,
            initial: DVector::zeros(4),
            inputs: vec![PortSpec::vector("elbow_torque", 1)],
            outputs: vec![PortSpec::vector("state", 4)],
        })
    }

    pub fn with_initial_state(mut self, x0: [f64; 4]) -> HfResult<Self> {
        hf_core::ensure_all_finite(&x0, "acrobot initial state")?;
        self.initial = DVector::from_column_slice(&x0);
        Ok(self)
    }

    pub fn params(&self) -> &AcrobotParams {
        &self.params
    }

    /// Link inertias about their joints and the coupling term `m2*l1*lc2`.
    fn lumped(&self) -> (f64, f64, f64) {
        let p = &self.params;
        let i1 = p.ic1.value + p.m1.value * p.lc1.value.powi(2);
        let i2 = p.ic2.value + p.m2.value * p.lc2.value.powi(2);
        (i1, i2, p.m2.value * p.l1.value * p.lc2.value)
    }

    pub fn mass_matrix(&self, theta2: f64) -> Matrix2<f64> {
        let (i1, i2, m2l1lc2) = self.lumped();
        let p = &self.params;
        let c2 = theta2.cos();
        let m12 = i2 + m2l1lc2 * c2;
        Matrix2::new(
            i1 + i2 + p.m2.value * p.l1.value.powi(2) + 2.0 * m2l1lc2 * c2,
            m12,
            m12,
            i2,
        )
    }

    /// `C(q, v) v - tau_g(q) + b v`: everything but the actuation.
    pub fn dynamics_bias(&self, q: Vector2<f64>, v: Vector2<f64>) -> Vector2<f64> {
        let (_, _, m2l1lc2) = self.lumped();
        let p = &self.params;
        let g = p.gravity.value;
        let (s1, s2, s12) = (q[0].sin(), q[1].sin(), (q[0] + q[1]).sin());

        let coriolis = Vector2::new(
            -2.0 * m2l1lc2 * s2 * v[1] * v[0] - m2l1lc2 * s2 * v[1] * v[1],
            m2l1lc2 * s2 * v[0] * v[0],
        );
        let gravity = Vector2::new(
            -g * p.m1.value * p.lc1.value * s1 - g * p.m2.value * (p.l1.value * s1 + p.lc2.value * s12),
            -g * p.m2.value * p.lc2.value * s12,
        );
        let damping = Vector2::new(p.b1 * v[0], p.b2 * v[1]);
        coriolis - gravity + damping
    }

    /// Kinetic plus potential energy, zero potential at the shoulder height.
    pub fn energy(&self, x: &DVector<f64>) -> f64 {
        let p = &self.params;
        let g = p.gravity.value;
        let v = Vector2::new(x[2], x[3]);
        let kinetic = 0.5 * v.dot(&(self.mass_matrix(x[1]) * v));
        let (c1, c12) = (x[0].cos(), (x[0] + x[1]).cos());
        let potential = -p.m1.value * g * p.lc1.value * c1
            - p.m2.value * g * (p.l1.value * c1 + p.lc2.value * c12);
        kinetic + potential
    }
}

impl LeafSystem for AcrobotPlant {
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
        4
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
        let tau = inputs.vector(0)?[0];
        let q = Vector2::new(x[0], x[1]);
        let v = Vector2::new(x[2], x[3]);

        let rhs = Vector2::new(0.0, tau) - self.dynamics_bias(q, v);
        let vdot = self
            .mass_matrix(q[1])
            .cholesky()
            .map(|chol| chol.solve(&rhs))
            .ok_or_else(|| EvalError::domain(&self.name, "singular mass matrix"))?;
        Ok(DVector::from_column_slice(&[v[0], v[1], vdot[0], vdot[1]]))
    }
}
