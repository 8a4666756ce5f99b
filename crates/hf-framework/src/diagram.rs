//! Sealed composite system.

use std::collections::HashMap;
use std::fmt;

use hf_core::SystemId;

use crate::context::{Context, ContextRecord};
use crate::port::{InputPortRef, OutputPortRef, PortSpec};
use crate::system::System;

/// Where a child input gets its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Output `port` of the sibling at `slot`.
    Connection { slot: usize, port: usize },
    /// The diagram's own exported input.
    Exported(usize),
}

/// A built diagram: owned children plus immutable wiring.
///
/// Construct with [`crate::DiagramBuilder`].
pub struct Diagram {
    pub(crate) name: String,
    pub(crate) children: Vec<System>,
    pub(crate) connections: Vec<(OutputPortRef, InputPortRef)>,
    /// Keyed by (child slot, child input port).
    pub(crate) input_sources: HashMap<(usize, usize), InputSource>,
    pub(crate) exported_inputs: Vec<InputPortRef>,
    pub(crate) exported_outputs: Vec<OutputPortRef>,
    pub(crate) input_specs: Vec<PortSpec>,
    pub(crate) output_specs: Vec<PortSpec>,
    /// Record offset of each child relative to the diagram's own record.
    pub(crate) child_offsets: Vec<usize>,
    pub(crate) record_count: usize,
    /// `feedthrough[input][output]`.
    pub(crate) feedthrough: Vec<Vec<bool>>,
}

impl Diagram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[System] {
        &self.children
    }

    pub fn child(&self, id: SystemId) -> Option<&System> {
        self.children.get(id.slot())
    }

    /// Child names in add order.
    pub fn system_names(&self) -> Vec<&str> {
        self.children.iter().map(System::name).collect()
    }

    /// Handle of the first child with this name.
    pub fn system_id(&self, name: &str) -> Option<SystemId> {
        let slot = self.children.iter().position(|c| c.name() == name)?;
        SystemId::from_slot(slot)
    }

    pub fn connections(&self) -> &[(OutputPortRef, InputPortRef)] {
        &self.connections
    }

    pub fn exported_inputs(&self) -> &[InputPortRef] {
        &self.exported_inputs
    }

    pub fn exported_outputs(&self) -> &[OutputPortRef] {
        &self.exported_outputs
    }

    pub fn input_specs(&self) -> &[PortSpec] {
        &self.input_specs
    }

    pub fn output_specs(&self) -> &[PortSpec] {
        &self.output_specs
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn has_direct_feedthrough(&self, input: usize, output: usize) -> bool {
        self.feedthrough
            .get(input)
            .and_then(|row| row.get(output))
            .copied()
            .unwrap_or(false)
    }

    pub fn input_source(&self, slot: usize, port: usize) -> Option<InputSource> {
        self.input_sources.get(&(slot, port)).copied()
    }

    /// Child (slot, output port) behind an exported output.
    pub fn exported_output_source(&self, port: usize) -> Option<(usize, usize)> {
        self.exported_outputs
            .get(port)
            .map(|r| (r.system.slot(), r.index))
    }

    pub(crate) fn child_offset(&self, slot: usize) -> usize {
        self.child_offsets.get(slot).copied().unwrap_or(self.record_count)
    }

    /// Child slot whose record range contains `record`, with that child's offset.
    pub(crate) fn slot_for_record(&self, record: usize) -> Option<(usize, usize)> {
        if record == 0 || record >= self.record_count {
            return None;
        }
        let slot = self.child_offsets.partition_point(|&o| o <= record).checked_sub(1)?;
        Some((slot, self.child_offsets[slot]))
    }

    /// Record index of a child when this diagram is the context root.
    pub fn child_record(&self, id: SystemId) -> Option<usize> {
        self.child_offsets.get(id.slot()).copied()
    }

    /// A child's record in a context created by this diagram.
    pub fn subsystem_context<'c>(&self, ctx: &'c Context, id: SystemId) -> Option<&'c ContextRecord> {
        ctx.record(self.child_record(id)?)
    }

    /// Mutable access to a child's record, e.g. to set initial conditions.
    pub fn subsystem_context_mut<'c>(
        &self,
        ctx: &'c mut Context,
        id: SystemId,
    ) -> Option<&'c mut ContextRecord> {
        ctx.record_mut(self.child_record(id)?)
    }
}

impl fmt::Debug for Diagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagram")
            .field("name", &self.name)
            .field("children", &self.children)
            .field("connections", &self.connections.len())
            .finish()
    }
}
