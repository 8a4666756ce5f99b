//! Incremental diagram builder.

use std::collections::HashMap;

use hf_core::SystemId;

use crate::diagram::{Diagram, InputSource};
use crate::error::{BuildError, BuildResult};
use crate::leaf::LeafSystem;
use crate::port::{InputPortRef, OutputPortRef, PortDirection, PortSpec};
use crate::system::System;
use crate::validate;

/// Builder for a diagram.
///
/// Add children and wire them with `connect`, export the ports the outside
/// world should see, then call `build()` to validate and seal the topology.
#[derive(Debug)]
pub struct DiagramBuilder {
    name: String,
    children: Vec<System>,
    connections: Vec<(OutputPortRef, InputPortRef)>,
    exported_inputs: Vec<(String, InputPortRef)>,
    exported_outputs: Vec<(String, OutputPortRef)>,
    built: bool,
}

impl DiagramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            connections: Vec::new(),
            exported_inputs: Vec::new(),
            exported_outputs: Vec::new(),
            built: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a child system; the handle records add order.
    pub fn add_system(&mut self, system: System) -> BuildResult<SystemId> {
        self.ensure_open()?;
        let id = SystemId::from_slot(self.children.len()).ok_or_else(|| BuildError::TooManySystems {
            diagram: self.name.clone(),
        })?;
        self.children.push(system);
        Ok(id)
    }

    pub fn add_leaf(&mut self, leaf: impl LeafSystem + 'static) -> BuildResult<SystemId> {
        self.add_system(System::leaf(leaf))
    }

    pub fn add_diagram(&mut self, diagram: Diagram) -> BuildResult<SystemId> {
        self.add_system(System::Diagram(diagram))
    }

    pub fn system(&self, id: SystemId) -> BuildResult<&System> {
        self.children
            .get(id.slot())
            .ok_or(BuildError::UnknownSystem { system: id })
    }

    /// Input port of a child by name.
    pub fn input(&self, id: SystemId, name: &str) -> BuildResult<InputPortRef> {
        let system = self.system(id)?;
        system
            .input_port_index(name)
            .map(|index| InputPortRef::new(id, index))
            .ok_or_else(|| BuildError::UnknownPortName {
                system: system.name().to_string(),
                direction: PortDirection::Input,
                name: name.to_string(),
            })
    }

    /// Output port of a child by name.
    pub fn output(&self, id: SystemId, name: &str) -> BuildResult<OutputPortRef> {
        let system = self.system(id)?;
        system
            .output_port_index(name)
            .map(|index| OutputPortRef::new(id, index))
            .ok_or_else(|| BuildError::UnknownPortName {
                system: system.name().to_string(),
                direction: PortDirection::Output,
                name: name.to_string(),
            })
    }

    /// Wire a child output into a child input.
    pub fn connect(&mut self, from: OutputPortRef, to: InputPortRef) -> BuildResult<()> {
        self.ensure_open()?;
        let out_spec = self.output_spec(from)?.clone();
        let in_spec = self.input_spec(to)?.clone();
        if out_spec.kind != in_spec.kind {
            return Err(BuildError::KindMismatch {
                from: self.system(from.system)?.name().to_string(),
                to: self.system(to.system)?.name().to_string(),
                output: out_spec.kind,
                input: in_spec.kind,
            });
        }
        self.ensure_input_free(to, &in_spec)?;
        self.connections.push((from, to));
        Ok(())
    }

    /// Connect by port names.
    pub fn connect_by_name(
        &mut self,
        from: SystemId,
        output: &str,
        to: SystemId,
        input: &str,
    ) -> BuildResult<()> {
        let from = self.output(from, output)?;
        let to = self.input(to, input)?;
        self.connect(from, to)
    }

    /// Expose a child input as a diagram input; returns its index.
    pub fn export_input(&mut self, input: InputPortRef, name: impl Into<String>) -> BuildResult<usize> {
        self.ensure_open()?;
        let name = name.into();
        let spec = self.input_spec(input)?.clone();
        if self.exported_inputs.iter().any(|(n, _)| *n == name) {
            return Err(BuildError::DuplicateExportName {
                direction: PortDirection::Input,
                name,
            });
        }
        self.ensure_input_free(input, &spec)?;
        self.exported_inputs.push((name, input));
        Ok(self.exported_inputs.len() - 1)
    }

    /// Expose a child output as a diagram output; returns its index.
    pub fn export_output(
        &mut self,
        output: OutputPortRef,
        name: impl Into<String>,
    ) -> BuildResult<usize> {
        self.ensure_open()?;
        let name = name.into();
        self.output_spec(output)?;
        if self.exported_outputs.iter().any(|(n, _)| *n == name) {
            return Err(BuildError::DuplicateExportName {
                direction: PortDirection::Output,
                name,
            });
        }
        self.exported_outputs.push((name, output));
        Ok(self.exported_outputs.len() - 1)
    }

    /// Validate and seal the diagram.
    pub fn build(mut self) -> BuildResult<Diagram> {
        self.build_in_place()
    }

    /// Validate and seal the diagram, leaving this builder spent.
    ///
    /// On error nothing is consumed and the builder can still be fixed up.
    /// After success every further operation fails with `AlreadyBuilt`.
    pub fn build_in_place(&mut self) -> BuildResult<Diagram> {
        self.ensure_open()?;
        validate::validate_connected(&self.children, &self.connections, &self.exported_inputs)?;
        let graph = validate::FeedthroughGraph::new(&self.children, &self.connections);
        graph.check_acyclic(&self.children)?;

        let feedthrough = self
            .exported_inputs
            .iter()
            .map(|(_, input)| {
                self.exported_outputs
                    .iter()
                    .map(|(_, output)| graph.reaches(&self.children, *input, *output))
                    .collect()
            })
            .collect();

        let mut child_offsets = Vec::with_capacity(self.children.len());
        let mut next = 1;
        for child in &self.children {
            child_offsets.push(next);
            next += child.record_count();
        }

        let mut input_sources = HashMap::new();
        for (from, to) in &self.connections {
            input_sources.insert(
                (to.system.slot(), to.index),
                InputSource::Connection {
                    slot: from.system.slot(),
                    port: from.index,
                },
            );
        }
        for (k, (_, input)) in self.exported_inputs.iter().enumerate() {
            input_sources.insert((input.system.slot(), input.index), InputSource::Exported(k));
        }

        let input_specs = self
            .exported_inputs
            .iter()
            .map(|(name, input)| {
                self.input_spec(*input)
                    .map(|spec| PortSpec { name: name.clone(), kind: spec.kind })
            })
            .collect::<BuildResult<Vec<_>>>()?;
        let output_specs = self
            .exported_outputs
            .iter()
            .map(|(name, output)| {
                self.output_spec(*output)
                    .map(|spec| PortSpec { name: name.clone(), kind: spec.kind })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        self.built = true;
        Ok(Diagram {
            name: self.name.clone(),
            children: std::mem::take(&mut self.children),
            connections: std::mem::take(&mut self.connections),
            input_sources,
            exported_inputs: self.exported_inputs.drain(..).map(|(_, p)| p).collect(),
            exported_outputs: self.exported_outputs.drain(..).map(|(_, p)| p).collect(),
            input_specs,
            output_specs,
            child_offsets,
            record_count: next,
            feedthrough,
        })
    }

    fn ensure_open(&self) -> BuildResult<()> {
        if self.built {
            Err(BuildError::AlreadyBuilt {
                diagram: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn input_spec(&self, port: InputPortRef) -> BuildResult<&PortSpec> {
        let system = self.system(port.system)?;
        let specs = system.input_specs();
        specs.get(port.index).ok_or_else(|| BuildError::PortOutOfRange {
            system: system.name().to_string(),
            direction: PortDirection::Input,
            index: port.index,
            count: specs.len(),
        })
    }

    fn output_spec(&self, port: OutputPortRef) -> BuildResult<&PortSpec> {
        let system = self.system(port.system)?;
        let specs = system.output_specs();
        specs.get(port.index).ok_or_else(|| BuildError::PortOutOfRange {
            system: system.name().to_string(),
            direction: PortDirection::Output,
            index: port.index,
            count: specs.len(),
        })
    }

    fn ensure_input_free(&self, input: InputPortRef, spec: &PortSpec) -> BuildResult<()> {
        let taken = self.connections.iter().any(|(_, to)| *to == input)
            || self.exported_inputs.iter().any(|(_, p)| *p == input);
        if taken {
            return Err(BuildError::InputAlreadyConnected {
                system: self.system(input.system)?.name().to_string(),
                port: spec.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LeafContext;
    use crate::error::EvalResult;
    use crate::evaluate::InputPorts;
    use crate::value::Value;

    struct Pass {
        name: String,
        ports: Vec<PortSpec>,
        feedthrough: bool,
    }

    impl Pass {
        fn new(name: &str, feedthrough: bool) -> Self {
            Self {
                name: name.into(),
                ports: vec![PortSpec::vector("x", 1)],
                feedthrough,
            }
        }
    }

    impl LeafSystem for Pass {
        fn name(&self) -> &str {
            &self.name
        }
        fn input_ports(&self) -> &[PortSpec] {
            &self.ports
        }
        fn output_ports(&self) -> &[PortSpec] {
            &self.ports
        }
        fn has_direct_feedthrough(&self, _: usize, _: usize) -> bool {
            self.feedthrough
        }
        fn calc_output(&self, _: &LeafContext<'_>, inputs: &InputPorts<'_>, _: usize) -> EvalResult<Value> {
            if self.feedthrough {
                inputs.eval(0)
            } else {
                Ok(Value::from_slice(&[0.0]))
            }
        }
    }

    #[test]
    fn handles_follow_add_order() {
        let mut b = DiagramBuilder::new("d");
        let a = b.add_leaf(Pass::new("a", true)).unwrap();
        let c = b.add_leaf(Pass::new("c", true)).unwrap();
        assert_eq!(a.slot(), 0);
        assert_eq!(c.slot(), 1);
    }

    #[test]
    fn second_connection_into_input_is_rejected() {
        let mut b = DiagramBuilder::new("d");
        let a = b.add_leaf(Pass::new("a", false)).unwrap();
        let c = b.add_leaf(Pass::new("c", false)).unwrap();
        b.connect(OutputPortRef::new(a, 0), InputPortRef::new(c, 0)).unwrap();
        let err = b
            .connect(OutputPortRef::new(c, 0), InputPortRef::new(c, 0))
            .unwrap_err();
        assert!(matches!(err, BuildError::InputAlreadyConnected { .. }));
        let err = b.export_input(InputPortRef::new(c, 0), "u").unwrap_err();
        assert!(matches!(err, BuildError::InputAlreadyConnected { .. }));
    }

    #[test]
    fn failed_build_leaves_builder_usable() {
        let mut b = DiagramBuilder::new("d");
        let a = b.add_leaf(Pass::new("a", true)).unwrap();
        assert!(matches!(
            b.build_in_place(),
            Err(BuildError::DisconnectedInput { .. })
        ));
        b.export_input(InputPortRef::new(a, 0), "u").unwrap();
        let diagram = b.build_in_place().unwrap();
        assert_eq!(diagram.input_specs().len(), 1);
        assert!(matches!(
            b.add_leaf(Pass::new("late", true)),
            Err(BuildError::AlreadyBuilt { .. })
        ));
        assert!(matches!(b.build_in_place(), Err(BuildError::AlreadyBuilt { .. })));
    }

    #[test]
    fn duplicate_export_names_are_rejected() {
        let mut b = DiagramBuilder::new("d");
        let a = b.add_leaf(Pass::new("a", false)).unwrap();
        b.export_output(OutputPortRef::new(a, 0), "y").unwrap();
        let err = b.export_output(OutputPortRef::new(a, 0), "y").unwrap_err();
        assert!(matches!(err, BuildError::DuplicateExportName { .. }));
    }

    #[test]
    fn unknown_port_name() {
        let mut b = DiagramBuilder::new("d");
        let a = b.add_leaf(Pass::new("a", false)).unwrap();
        assert!(matches!(
            b.input(a, "nope"),
            Err(BuildError::UnknownPortName { .. })
        ));
        assert_eq!(b.output(a, "x").unwrap(), OutputPortRef::new(a, 0));
    }
}
