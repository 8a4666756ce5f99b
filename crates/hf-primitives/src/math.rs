//! Memoryless vector math blocks. All have direct feedthrough.

use hf_framework::{
    EvalError, EvalResult, InputPorts, LeafContext, LeafSystem, PortDirection, PortSpec, Value,
};
use nalgebra::{DMatrix, DVector};

use crate::error::{PrimitiveError, PrimitiveResult};

/// y = k * u.
pub struct Gain {
    name: String,
    k: f64,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl Gain {
    pub fn new(name: impl Into<String>, k: f64, width: usize) -> PrimitiveResult<Self> {
        if !k.is_finite() {
            return Err(PrimitiveError::InvalidArg {
                what: "gain must be finite",
            });
        }
        Ok(Self {
            name: name.into(),
            k,
            inputs: vec![PortSpec::vector("u", width)],
            outputs: vec![PortSpec::vector("y", width)],
        })
    }
}

impl LeafSystem for Gain {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(inputs.vector(0)? * self.k))
    }
}

/// y = K u for a fixed matrix K.
pub struct MatrixGain {
    name: String,
    k: DMatrix<f64>,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl MatrixGain {
    pub fn new(name: impl Into<String>, k: DMatrix<f64>) -> Self {
        let inputs = vec![PortSpec::vector("u", k.ncols())];
        let outputs = vec![PortSpec::vector("y", k.nrows())];
        Self {
            name: name.into(),
            k,
            inputs,
            outputs,
        }
    }
}

impl LeafSystem for MatrixGain {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(&self.k * inputs.vector(0)?))
    }
}

/// Stacks several vector inputs into one output.
pub struct Multiplexer {
    name: String,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl Multiplexer {
    pub fn new(name: impl Into<String>, widths: &[usize]) -> PrimitiveResult<Self> {
        if widths.is_empty() {
            return Err(PrimitiveError::InvalidArg {
                what: "multiplexer needs at least one input",
            });
        }
        let inputs = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| PortSpec::vector(format!("u{i}"), w))
            .collect();
        Ok(Self {
            name: name.into(),
            inputs,
            outputs: vec![PortSpec::vector("y", widths.iter().sum())],
        })
    }
}

impl LeafSystem for Multiplexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        let mut out = Vec::new();
        for i in 0..self.inputs.len() {
            out.extend_from_slice(inputs.vector(i)?.as_slice());
        }
        Ok(Value::Vector(DVector::from_vec(out)))
    }
}

/// Splits one vector input into consecutive slices.
pub struct Demultiplexer {
    name: String,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    offsets: Vec<usize>,
    widths: Vec<usize>,
}

impl Demultiplexer {
    pub fn new(name: impl Into<String>, widths: &[usize]) -> PrimitiveResult<Self> {
        if widths.is_empty() {
            return Err(PrimitiveError::InvalidArg {
                what: "demultiplexer needs at least one output",
            });
        }
        let mut offsets = Vec::with_capacity(widths.len());
        let mut total = 0;
        for &w in widths {
            offsets.push(total);
            total += w;
        }
        let outputs = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| PortSpec::vector(format!("y{i}"), w))
            .collect();
        Ok(Self {
            name: name.into(),
            inputs: vec![PortSpec::vector("u", total)],
            outputs,
            offsets,
            widths: widths.to_vec(),
        })
    }

    /// Split evenly into `count` outputs of `width` each.
    pub fn uniform(name: impl Into<String>, count: usize, width: usize) -> PrimitiveResult<Self> {
        Self::new(name, &vec![width; count])
    }
}

impl LeafSystem for Demultiplexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, _ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, port: usize) -> EvalResult<Value> {
        let (Some(&start), Some(&width)) = (self.offsets.get(port), self.widths.get(port)) else {
            return Err(EvalError::PortOutOfRange {
                system: self.name.clone(),
                direction: PortDirection::Output,
                index: port,
                count: self.outputs.len(),
            });
        };
        let u = inputs.vector(0)?;
        Ok(Value::Vector(u.rows(start, width).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::{DiagramBuilder, InputPortRef, OutputPortRef, System};

    #[test]
    fn gain_scales_fixed_input() {
        let system = System::leaf(Gain::new("g", -2.0, 2).unwrap());
        let mut ctx = system.create_default_context();
        system
            .fix_input_port(&mut ctx, 0, Value::from_slice(&[1.0, 3.0]))
            .unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[-2.0, -6.0]));
    }

    #[test]
    fn matrix_gain_shapes_ports() {
        let k = DMatrix::from_row_slice(1, 2, &[1.0, 10.0]);
        let system = System::leaf(MatrixGain::new("k", k));
        assert_eq!(system.input_specs()[0], PortSpec::vector("u", 2));
        assert_eq!(system.output_specs()[0], PortSpec::vector("y", 1));
        let mut ctx = system.create_default_context();
        system
            .fix_input_port(&mut ctx, 0, Value::from_slice(&[2.0, 0.5]))
            .unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[7.0]));
    }

    #[test]
    fn mux_then_demux_recovers_parts() {
        let mut b = DiagramBuilder::new("d");
        let mux = b.add_leaf(Multiplexer::new("mux", &[1, 2]).unwrap()).unwrap();
        let demux = b.add_leaf(Demultiplexer::new("demux", &[2, 1]).unwrap()).unwrap();
        b.connect(OutputPortRef::new(mux, 0), InputPortRef::new(demux, 0))
            .unwrap();
        b.export_input(InputPortRef::new(mux, 0), "a").unwrap();
        b.export_input(InputPortRef::new(mux, 1), "b").unwrap();
        b.export_output(OutputPortRef::new(demux, 0), "head").unwrap();
        b.export_output(OutputPortRef::new(demux, 1), "tail").unwrap();
        let system = System::from(b.build().unwrap());

        let mut ctx = system.create_default_context();
        system.fix_input_port(&mut ctx, 0, Value::from_slice(&[1.0])).unwrap();
        system
            .fix_input_port(&mut ctx, 1, Value::from_slice(&[2.0, 3.0]))
            .unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[1.0, 2.0]));
        assert_eq!(system.compute_output(&ctx, 1).unwrap(), Value::from_slice(&[3.0]));
    }

    #[test]
    fn invalid_configs() {
        assert!(Gain::new("g", f64::NAN, 1).is_err());
        assert!(Multiplexer::new("m", &[]).is_err());
        assert!(Demultiplexer::uniform("d", 0, 2).is_err());
    }
}
