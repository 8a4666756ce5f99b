//! Model files: YAML descriptions of dynamics systems.
//!
//! ```yaml
//! kind: acrobot
//! name: arm
//! m2: 1.2
//! b1: 0.0
//! ```
//!
//! Supported kinds are `acrobot` (every parameter optional), `double_integrator`
//! and `linear` (`a`, `b`, optional `c`, `d`, `initial_state`).

use std::path::Path;

use hf_core::units::{kg, kgm2, m, mps2};
use hf_framework::System;
use hf_primitives::LinearSystem;
use nalgebra::DMatrix;
use serde::Deserialize;
use tracing::info;

use crate::acrobot::{AcrobotParams, AcrobotPlant};
use crate::double_integrator::DoubleIntegrator;
use crate::error::{LoadError, LoadResult};

/// Turns a model file into a dynamics system.
pub trait ModelLoader {
    fn load_str(&self, text: &str) -> LoadResult<System>;

    fn load(&self, path: &Path) -> LoadResult<System> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let system = self.load_str(&text)?;
        info!(path = %path.display(), model = system.name(), "loaded model");
        Ok(system)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlModelLoader;

impl ModelLoader for YamlModelLoader {
    fn load_str(&self, text: &str) -> LoadResult<System> {
        let spec: ModelSpec = serde_yaml::from_str(text)?;
        spec.build()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Acrobot(AcrobotSpec),
    DoubleIntegrator(DoubleIntegratorSpec),
    Linear(LinearSpec),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcrobotSpec {
    pub name: String,
    pub m1: f64,
    pub m2: f64,
    pub l1: f64,
    pub l2: f64,
    pub lc1: f64,
    pub lc2: f64,
    pub ic1: f64,
    pub ic2: f64,
    pub b1: f64,
    pub b2: f64,
    pub gravity: f64,
    pub initial_state: [f64; 4],
}

impl Default for AcrobotSpec {
    fn default() -> Self {
        let p = AcrobotParams::default();
        Self {
            name: "acrobot".to_string(),
            m1: p.m1.value,
            m2: p.m2.value,
            l1: p.l1.value,
            l2: p.l2.value,
            lc1: p.lc1.value,
            lc2: p.lc2.value,
            ic1: p.ic1.value,
            ic2: p.ic2.value,
            b1: p.b1,
            b2: p.b2,
            gravity: p.gravity.value,
            initial_state: [0.0; 4],
        }
    }
}

impl AcrobotSpec {
    pub fn params(&self) -> AcrobotParams {
        AcrobotParams {
            m1: kg(self.m1),
            m2: kg(self.m2),
            l1: m(self.l1),
            l2: m(self.l2),
            lc1: m(self.lc1),
            lc2: m(self.lc2),
            ic1: kgm2(self.ic1),
            ic2: kgm2(self.ic2),
            b1: self.b1,
            b2: self.b2,
            gravity: mps2(self.gravity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoubleIntegratorSpec {
    #[serde(default = "DoubleIntegratorSpec::default_name")]
    pub name: String,
    #[serde(default = "DoubleIntegratorSpec::default_mass")]
    pub mass: f64,
    #[serde(default)]
    pub initial_state: [f64; 2],
}

impl DoubleIntegratorSpec {
    fn default_name() -> String {
        "double_integrator".to_string()
    }

    fn default_mass() -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearSpec {
    #[serde(default = "LinearSpec::default_name")]
    pub name: String,
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    /// Defaults to the identity (full state output).
    #[serde(default)]
    pub c: Option<Vec<Vec<f64>>>,
    /// Defaults to zero.
    #[serde(default)]
    pub d: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub initial_state: Option<Vec<f64>>,
}

impl LinearSpec {
    fn default_name() -> String {
        "linear".to_string()
    }
}

fn matrix(what: &str, rows: &[Vec<f64>]) -> LoadResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || ncols == 0 {
        return Err(LoadError::Invalid {
            what: format!("matrix '{what}' is empty"),
        });
    }
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(LoadError::Invalid {
            what: format!("matrix '{what}' has rows of different lengths"),
        });
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flatten().copied(),
    ))
}

impl ModelSpec {
    pub fn build(&self) -> LoadResult<System> {
        let system = match self {
            ModelSpec::Acrobot(spec) => System::leaf(
                AcrobotPlant::new(spec.name.clone(), spec.params())?
                    .with_initial_state(spec.initial_state)?,
            ),
            ModelSpec::DoubleIntegrator(spec) => System::leaf(
                DoubleIntegrator::new(spec.name.clone(), kg(spec.mass))?
                    .with_initial_state(spec.initial_state[0], spec.initial_state[1])?,
            ),
            ModelSpec::Linear(spec) => {
                let a = matrix("a", &spec.a)?;
                let b = matrix("b", &spec.b)?;
                let c = match &spec.c {
                    Some(rows) => matrix("c", rows)?,
                    None => DMatrix::identity(a.nrows(), a.nrows()),
                };
                let d = match &spec.d {
                    Some(rows) => matrix("d", rows)?,
                    None => DMatrix::zeros(c.nrows(), b.ncols()),
                };
                let mut plant = LinearSystem::new(spec.name.clone(), a, b, c, d)?;
                if let Some(x0) = &spec.initial_state {
                    plant = plant.with_initial_state(x0)?;
                }
                System::leaf(plant)
            }
        };
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acrobot_defaults_and_overrides() {
        let spec: ModelSpec = serde_yaml::from_str("kind: acrobot\nm2: 1.5\n").unwrap();
        let ModelSpec::Acrobot(acrobot) = &spec else {
            panic!("expected acrobot, got {spec:?}");
        };
        assert_eq!(acrobot.m2, 1.5);
        assert_eq!(acrobot.params().m1, kg(1.0));
        assert_eq!(acrobot.params().ic2, kgm2(0.33));

        let system = spec.build().unwrap();
        assert_eq!(system.name(), "acrobot");
        assert_eq!(system.continuous_state_size(), 4);
        assert_eq!(system.input_port_index("elbow_torque"), Some(0));
    }

    #[test]
    fn double_integrator_spec() {
        let system = YamlModelLoader
            .load_str("kind: double_integrator\nname: cart\nmass: 2.0\ninitial_state: [1.0, 0.0]\n")
            .unwrap();
        assert_eq!(system.name(), "cart");
        let ctx = system.create_default_context();
        assert_eq!(ctx.continuous_state().as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn linear_spec_defaults_output_to_state() {
        let text = "kind: linear\na: [[0.0, 1.0], [0.0, 0.0]]\nb: [[0.0], [1.0]]\n";
        let system = YamlModelLoader.load_str(text).unwrap();
        assert_eq!(system.continuous_state_size(), 2);
        assert_eq!(system.output_specs()[0].kind, hf_framework::ValueKind::Vector(2));
    }

    #[test]
    fn ragged_matrix_is_invalid() {
        let text = "kind: linear\na: [[0.0, 1.0], [0.0]]\nb: [[0.0], [1.0]]\n";
        assert!(matches!(YamlModelLoader.load_str(text), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn unknown_kind_and_field_fail_to_parse() {
        assert!(matches!(YamlModelLoader.load_str("kind: rocket\n"), Err(LoadError::Parse(_))));
        assert!(matches!(
            YamlModelLoader.load_str("kind: acrobot\nmass: 3.0\n"),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn nonphysical_parameters_are_invalid() {
        assert!(matches!(
            YamlModelLoader.load_str("kind: acrobot\nl1: -1.0\n"),
            Err(LoadError::Invalid { .. })
        ));
    }
}
