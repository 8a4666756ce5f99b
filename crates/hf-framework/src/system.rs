//! The recursive system variant: a leaf or a diagram of systems.

use std::fmt;

use nalgebra::DVector;

use crate::context::{Context, ContextRecord, DiscreteUpdate};
use crate::diagram::Diagram;
use crate::error::{EvalError, EvalResult};
use crate::evaluate::Evaluator;
use crate::event::{Event, EventDeclaration};
use crate::leaf::LeafSystem;
use crate::port::{find_port, PortDirection, PortSpec};
use crate::value::Value;

/// A unit of computation over a context.
///
/// Topology is fixed once constructed. All mutable state lives in a
/// `Context` created by `create_default_context`.
pub enum System {
    Leaf(Box<dyn LeafSystem>),
    Diagram(Diagram),
}

impl System {
    pub fn leaf(leaf: impl LeafSystem + 'static) -> Self {
        System::Leaf(Box::new(leaf))
    }

    pub fn name(&self) -> &str {
        match self {
            System::Leaf(l) => l.name(),
            System::Diagram(d) => d.name(),
        }
    }

    pub fn as_diagram(&self) -> Option<&Diagram> {
        match self {
            System::Diagram(d) => Some(d),
            System::Leaf(_) => None,
        }
    }

    pub fn input_specs(&self) -> &[PortSpec] {
        match self {
            System::Leaf(l) => l.input_ports(),
            System::Diagram(d) => d.input_specs(),
        }
    }

    pub fn output_specs(&self) -> &[PortSpec] {
        match self {
            System::Leaf(l) => l.output_ports(),
            System::Diagram(d) => d.output_specs(),
        }
    }

    pub fn num_input_ports(&self) -> usize {
        self.input_specs().len()
    }

    pub fn num_output_ports(&self) -> usize {
        self.output_specs().len()
    }

    pub fn input_port_index(&self, name: &str) -> Option<usize> {
        find_port(self.input_specs(), name)
    }

    pub fn output_port_index(&self, name: &str) -> Option<usize> {
        find_port(self.output_specs(), name)
    }

    pub fn continuous_state_size(&self) -> usize {
        match self {
            System::Leaf(l) => l.continuous_state_size(),
            System::Diagram(d) => d
                .children()
                .iter()
                .map(System::continuous_state_size)
                .sum(),
        }
    }

    pub fn has_direct_feedthrough(&self, input: usize, output: usize) -> bool {
        match self {
            System::Leaf(l) => l.has_direct_feedthrough(input, output),
            System::Diagram(d) => d.has_direct_feedthrough(input, output),
        }
    }

    /// Number of context records this system occupies (itself plus descendants).
    pub fn record_count(&self) -> usize {
        match self {
            System::Leaf(_) => 1,
            System::Diagram(d) => d.record_count(),
        }
    }

    /// System at a pre-order record index relative to this one.
    pub fn node_at(&self, record: usize) -> Option<&System> {
        if record == 0 {
            return Some(self);
        }
        match self {
            System::Leaf(_) => None,
            System::Diagram(d) => {
                let (slot, offset) = d.slot_for_record(record)?;
                d.children().get(slot)?.node_at(record - offset)
            }
        }
    }

    /// Every leaf with its record index, in pre-order.
    pub fn leaves(&self) -> Vec<(usize, &dyn LeafSystem)> {
        let mut out = Vec::new();
        self.collect_leaves(0, &mut out);
        out
    }

    fn collect_leaves<'s>(&'s self, base: usize, out: &mut Vec<(usize, &'s dyn LeafSystem)>) {
        match self {
            System::Leaf(l) => out.push((base, l.as_ref())),
            System::Diagram(d) => {
                for (slot, child) in d.children().iter().enumerate() {
                    child.collect_leaves(base + d.child_offset(slot), out);
                }
            }
        }
    }

    /// Allocate a context tree holding every system's declared defaults.
    pub fn create_default_context(&self) -> Context {
        let mut records = Vec::with_capacity(self.record_count());
        self.fill_records(&mut records, None, 0);
        Context::from_records(records)
    }

    fn fill_records(&self, records: &mut Vec<ContextRecord>, parent: Option<usize>, slot: usize) {
        let index = records.len();
        let mut record = ContextRecord::new(self.name(), self.num_input_ports());
        record.parent = parent;
        record.slot = slot;
        match self {
            System::Leaf(l) => {
                record.continuous_state = l.default_continuous_state();
                record.discrete_state = l.default_discrete_state();
                record.abstract_state = l.default_abstract_state();
                record.parameters = l.default_parameters();
                record.subtree = index + 1..index + 1;
                records.push(record);
            }
            System::Diagram(d) => {
                record.is_leaf = false;
                records.push(record);
                for (child_slot, child) in d.children().iter().enumerate() {
                    child.fill_records(records, Some(index), child_slot);
                }
                let end = records.len();
                records[index].subtree = index + 1..end;
            }
        }
    }

    /// Fix the value of one of this system's input ports in `ctx`.
    ///
    /// Used for root systems and standalone plants whose inputs no diagram
    /// feeds.
    pub fn fix_input_port(&self, ctx: &mut Context, index: usize, value: Value) -> EvalResult<()> {
        let specs = self.input_specs();
        let spec = specs.get(index).ok_or_else(|| EvalError::PortOutOfRange {
            system: self.name().to_string(),
            direction: PortDirection::Input,
            index,
            count: specs.len(),
        })?;
        if spec.kind != value.kind() {
            return Err(EvalError::PortKindMismatch {
                system: self.name().to_string(),
                port: spec.name.clone(),
                expected: spec.kind,
                actual: value.kind(),
            });
        }
        ctx.fix_input(0, index, value)?;
        Ok(())
    }

    /// Remove a previously fixed input value.
    pub fn unfix_input_port(&self, ctx: &mut Context, index: usize) -> Option<Value> {
        ctx.clear_fixed_input(0, index)
    }

    pub fn compute_output(&self, ctx: &Context, port: usize) -> EvalResult<Value> {
        Evaluator::new(self, ctx)?.eval_output(0, port)
    }

    /// Time derivatives of every leaf's continuous state, concatenated in
    /// pre-order (the layout of `Context::continuous_state`).
    pub fn compute_time_derivatives(&self, ctx: &Context) -> EvalResult<DVector<f64>> {
        let evaluator = Evaluator::new(self, ctx)?;
        let mut out = Vec::with_capacity(ctx.continuous_state_size());
        for (record, leaf) in self.leaves() {
            let leaf_ctx = evaluator.leaf_context(record)?;
            let expected = leaf_ctx.continuous_state().len();
            if expected == 0 {
                continue;
            }
            let xdot = leaf.calc_time_derivatives(&leaf_ctx, &evaluator.inputs(record))?;
            if xdot.len() != expected {
                return Err(EvalError::StateSize {
                    system: leaf.name().to_string(),
                    expected,
                    actual: xdot.len(),
                });
            }
            out.extend_from_slice(xdot.as_slice());
        }
        Ok(DVector::from_vec(out))
    }

    /// Periodic events declared by every leaf, in pre-order (add order).
    pub fn periodic_events(&self) -> Vec<EventDeclaration> {
        let mut out = Vec::new();
        for (record, leaf) in self.leaves() {
            for (ordinal, event) in leaf.periodic_events().into_iter().enumerate() {
                out.push(EventDeclaration {
                    owner: record,
                    system: leaf.name().to_string(),
                    ordinal,
                    event,
                });
            }
        }
        out
    }

    /// Staged discrete update for the owner of `event`.
    pub fn compute_discrete_update(&self, ctx: &Context, event: &Event) -> EvalResult<DiscreteUpdate> {
        let evaluator = Evaluator::new(self, ctx)?;
        self.discrete_update_with(&evaluator, event)
    }

    /// Staged updates for several events, all computed from the same snapshot.
    pub fn compute_discrete_updates(
        &self,
        ctx: &Context,
        events: &[Event],
    ) -> EvalResult<Vec<(usize, DiscreteUpdate)>> {
        let evaluator = Evaluator::new(self, ctx)?;
        events
            .iter()
            .map(|event| Ok((event.owner, self.discrete_update_with(&evaluator, event)?)))
            .collect()
    }

    fn discrete_update_with(&self, evaluator: &Evaluator<'_>, event: &Event) -> EvalResult<DiscreteUpdate> {
        let leaf = self.leaf_at(event.owner)?;
        let leaf_ctx = evaluator.leaf_context(event.owner)?;
        let mut update = DiscreteUpdate::from_record(evaluator.record(event.owner)?);
        leaf.calc_discrete_update(&leaf_ctx, &evaluator.inputs(event.owner), event, &mut update)?;
        Ok(update)
    }

    pub fn publish(&self, ctx: &Context, event: &Event) -> EvalResult<()> {
        self.publish_events(ctx, std::slice::from_ref(event))
    }

    /// Run publish hooks in order against one snapshot.
    pub fn publish_events(&self, ctx: &Context, events: &[Event]) -> EvalResult<()> {
        let evaluator = Evaluator::new(self, ctx)?;
        for event in events {
            let leaf = self.leaf_at(event.owner)?;
            let leaf_ctx = evaluator.leaf_context(event.owner)?;
            leaf.publish(&leaf_ctx, &evaluator.inputs(event.owner), event)?;
        }
        Ok(())
    }

    /// Run every leaf's initialization hook against `ctx`.
    pub fn initialize(&self, ctx: &Context) -> EvalResult<Vec<(usize, DiscreteUpdate)>> {
        let evaluator = Evaluator::new(self, ctx)?;
        let mut out = Vec::new();
        for (record, leaf) in self.leaves() {
            let leaf_ctx = evaluator.leaf_context(record)?;
            let mut update = DiscreteUpdate::from_record(evaluator.record(record)?);
            leaf.initialize(&leaf_ctx, &evaluator.inputs(record), &mut update)?;
            out.push((record, update));
        }
        Ok(out)
    }

    fn leaf_at(&self, record: usize) -> EvalResult<&dyn LeafSystem> {
        match self.node_at(record) {
            Some(System::Leaf(l)) => Ok(l.as_ref()),
            _ => Err(EvalError::UnknownRecord { record }),
        }
    }
}

impl From<Diagram> for System {
    fn from(diagram: Diagram) -> Self {
        System::Diagram(diagram)
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            System::Leaf(l) => f.debug_tuple("Leaf").field(&l.name()).finish(),
            System::Diagram(d) => f.debug_tuple("Diagram").field(d).finish(),
        }
    }
}
