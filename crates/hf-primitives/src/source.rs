//! Output-only sources.

use std::any::Any;

use hf_framework::{EvalResult, InputPorts, LeafContext, LeafSystem, PortSpec, Value};
use nalgebra::DVector;

/// Emits a fixed vector on output `y`.
pub struct ConstantVectorSource {
    name: String,
    value: DVector<f64>,
    outputs: Vec<PortSpec>,
}

impl ConstantVectorSource {
    pub fn new(name: impl Into<String>, value: &[f64]) -> Self {
        Self {
            name: name.into(),
            value: DVector::from_column_slice(value),
            outputs: vec![PortSpec::vector("y", value.len())],
        }
    }
}

impl LeafSystem for ConstantVectorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(self.value.clone()))
    }
}

/// Emits a fixed abstract value on output `y`.
pub struct ConstantValueSource {
    name: String,
    value: Value,
    outputs: Vec<PortSpec>,
}

impl ConstantValueSource {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: Value::from_abstract(value),
            outputs: vec![PortSpec::abstract_value("y")],
        }
    }
}

impl LeafSystem for ConstantValueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::System;

    #[test]
    fn constant_vector_source_output() {
        let system = System::leaf(ConstantVectorSource::new("c", &[1.0, -2.0]));
        let ctx = system.create_default_context();
        let y = system.compute_output(&ctx, 0).unwrap();
        assert_eq!(y, Value::from_slice(&[1.0, -2.0]));
    }

    #[test]
    fn constant_value_source_downcasts() {
        let system = System::leaf(ConstantValueSource::new("c", String::from("hello")));
        let ctx = system.create_default_context();
        let y = system.compute_output(&ctx, 0).unwrap();
        assert_eq!(y.downcast_ref::<String>().map(String::as_str), Some("hello"));
    }
}
