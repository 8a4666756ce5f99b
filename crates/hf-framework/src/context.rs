//! Context arena: the complete state of a system tree at one instant.
//!
//! Records are laid out in pre-order of the system tree. Record 0 is the root
//! system; a diagram record owns the contiguous range of its descendants
//! (`subtree`), so cloning the `Context` snapshots the whole tree.

use std::ops::Range;

use hf_core::{HfError, HfResult};
use nalgebra::DVector;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

/// State of one system instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    pub name: String,
    pub continuous_state: DVector<f64>,
    /// Discrete state groups, indexed by group id.
    pub discrete_state: Vec<DVector<f64>>,
    pub abstract_state: Vec<Value>,
    pub parameters: Vec<Value>,
    /// Values fixed on input ports that no parent diagram feeds.
    pub fixed_inputs: Vec<Option<Value>>,
    pub(crate) parent: Option<usize>,
    /// Position among the parent's children.
    pub(crate) slot: usize,
    /// Records owned by this one (empty for leaves).
    pub(crate) subtree: Range<usize>,
    pub(crate) is_leaf: bool,
}

impl ContextRecord {
    pub(crate) fn new(name: impl Into<String>, num_inputs: usize) -> Self {
        Self {
            name: name.into(),
            continuous_state: DVector::zeros(0),
            discrete_state: Vec::new(),
            abstract_state: Vec::new(),
            parameters: Vec::new(),
            fixed_inputs: vec![None; num_inputs],
            parent: None,
            slot: 0,
            subtree: 0..0,
            is_leaf: true,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn subtree(&self) -> Range<usize> {
        self.subtree.clone()
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }
}

/// Staged replacement for one leaf's discrete and abstract state.
///
/// Starts as a copy of the current state; the owning system edits it and the
/// simulator commits it once every update at that instant has been computed.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteUpdate {
    pub discrete_state: Vec<DVector<f64>>,
    pub abstract_state: Vec<Value>,
}

impl DiscreteUpdate {
    pub fn from_record(record: &ContextRecord) -> Self {
        Self {
            discrete_state: record.discrete_state.clone(),
            abstract_state: record.abstract_state.clone(),
        }
    }

    pub fn group_mut(&mut self, group: usize) -> HfResult<&mut DVector<f64>> {
        let len = self.discrete_state.len();
        self.discrete_state.get_mut(group).ok_or(HfError::IndexOob {
            what: "discrete state group",
            index: group,
            len,
        })
    }

    pub fn set_abstract(&mut self, index: usize, value: Value) -> HfResult<()> {
        let len = self.abstract_state.len();
        let slot = self.abstract_state.get_mut(index).ok_or(HfError::IndexOob {
            what: "abstract state",
            index,
            len,
        })?;
        *slot = value;
        Ok(())
    }
}

/// Read-only view of one leaf's record at the context time.
#[derive(Debug, Clone, Copy)]
pub struct LeafContext<'a> {
    time: f64,
    record: &'a ContextRecord,
}

impl<'a> LeafContext<'a> {
    pub fn new(time: f64, record: &'a ContextRecord) -> Self {
        Self { time, record }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    pub fn continuous_state(&self) -> &'a DVector<f64> {
        &self.record.continuous_state
    }

    pub fn discrete_state(&self, group: usize) -> EvalResult<&'a DVector<f64>> {
        self.record
            .discrete_state
            .get(group)
            .ok_or_else(|| self.missing("discrete state group", group))
    }

    pub fn abstract_state(&self, index: usize) -> EvalResult<&'a Value> {
        self.record
            .abstract_state
            .get(index)
            .ok_or_else(|| self.missing("abstract state", index))
    }

    pub fn parameter(&self, index: usize) -> EvalResult<&'a Value> {
        self.record
            .parameters
            .get(index)
            .ok_or_else(|| self.missing("parameter", index))
    }

    fn missing(&self, what: &'static str, index: usize) -> EvalError {
        EvalError::MissingState {
            system: self.record.name.clone(),
            what,
            index,
        }
    }
}

/// Context for a whole system tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    time: f64,
    version: u64,
    records: Vec<ContextRecord>,
}

impl Context {
    pub(crate) fn from_records(records: Vec<ContextRecord>) -> Self {
        Self {
            time: 0.0,
            version: 0,
            records,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, t: f64) {
        self.time = t;
        self.version += 1;
    }

    /// Incremented on every mutation; evaluation caches are bound to it.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ContextRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&ContextRecord> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut ContextRecord> {
        self.version += 1;
        self.records.get_mut(index)
    }

    /// Direct children of a record, in the order their systems were added.
    pub fn child_records(&self, index: usize) -> Vec<usize> {
        let Some(record) = self.records.get(index) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        let mut next = record.subtree.start;
        while next < record.subtree.end {
            children.push(next);
            next = self.records[next].subtree.end.max(next + 1);
        }
        children
    }

    /// Total continuous state size over all leaves.
    pub fn continuous_state_size(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_leaf)
            .map(|r| r.continuous_state.len())
            .sum()
    }

    /// Continuous state of every leaf, concatenated in pre-order.
    pub fn continuous_state(&self) -> DVector<f64> {
        let mut out = Vec::with_capacity(self.continuous_state_size());
        for record in self.records.iter().filter(|r| r.is_leaf) {
            out.extend_from_slice(record.continuous_state.as_slice());
        }
        DVector::from_vec(out)
    }

    /// Scatter a concatenated continuous state back into the leaves.
    pub fn set_continuous_state(&mut self, x: &DVector<f64>) -> HfResult<()> {
        let expected = self.continuous_state_size();
        if x.len() != expected {
            return Err(HfError::DimensionMismatch {
                what: "continuous state",
                expected,
                actual: x.len(),
            });
        }
        let mut offset = 0;
        for record in self.records.iter_mut().filter(|r| r.is_leaf) {
            let n = record.continuous_state.len();
            record
                .continuous_state
                .copy_from_slice(&x.as_slice()[offset..offset + n]);
            offset += n;
        }
        self.version += 1;
        Ok(())
    }

    /// Fix the value of an input port on a record.
    ///
    /// Only consulted when no parent diagram feeds that port.
    pub fn fix_input(&mut self, record: usize, port: usize, value: Value) -> HfResult<()> {
        let len = self.records.len();
        let rec = self.records.get_mut(record).ok_or(HfError::IndexOob {
            what: "context record",
            index: record,
            len,
        })?;
        let ports = rec.fixed_inputs.len();
        let slot = rec.fixed_inputs.get_mut(port).ok_or(HfError::IndexOob {
            what: "input port",
            index: port,
            len: ports,
        })?;
        *slot = Some(value);
        self.version += 1;
        Ok(())
    }

    /// Remove a fixed input value, returning what was there.
    pub fn clear_fixed_input(&mut self, record: usize, port: usize) -> Option<Value> {
        let taken = self
            .records
            .get_mut(record)?
            .fixed_inputs
            .get_mut(port)?
            .take();
        self.version += 1;
        taken
    }

    /// Commit a staged discrete update into a leaf record.
    pub fn apply_discrete_update(&mut self, record: usize, update: DiscreteUpdate) -> HfResult<()> {
        let len = self.records.len();
        let rec = self.records.get_mut(record).ok_or(HfError::IndexOob {
            what: "context record",
            index: record,
            len,
        })?;
        rec.discrete_state = update.discrete_state;
        rec.abstract_state = update.abstract_state;
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, parent: usize, slot: usize, n: usize, at: usize) -> ContextRecord {
        let mut r = ContextRecord::new(name, 0);
        r.parent = Some(parent);
        r.slot = slot;
        r.continuous_state = DVector::from_element(n, 0.0);
        r.subtree = at + 1..at + 1;
        r
    }

    // root(diagram) -> [a(leaf, 2 states), b(leaf, 1 state)]
    fn sample() -> Context {
        let mut root = ContextRecord::new("root", 0);
        root.is_leaf = false;
        root.subtree = 1..3;
        Context::from_records(vec![root, leaf("a", 0, 0, 2, 1), leaf("b", 0, 1, 1, 2)])
    }

    #[test]
    fn continuous_state_scatter_gather() {
        let mut ctx = sample();
        assert_eq!(ctx.continuous_state_size(), 3);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        ctx.set_continuous_state(&x).unwrap();
        assert_eq!(ctx.record(1).unwrap().continuous_state.as_slice(), &[1.0, 2.0]);
        assert_eq!(ctx.record(2).unwrap().continuous_state.as_slice(), &[3.0]);
        assert_eq!(ctx.continuous_state(), x);
    }

    #[test]
    fn wrong_state_size_is_rejected() {
        let mut ctx = sample();
        let err = ctx.set_continuous_state(&DVector::zeros(2)).unwrap_err();
        assert!(matches!(err, HfError::DimensionMismatch { expected: 3, .. }));
    }

    #[test]
    fn child_records_follow_add_order() {
        let ctx = sample();
        assert_eq!(ctx.child_records(0), vec![1, 2]);
        assert!(ctx.child_records(1).is_empty());
    }

    #[test]
    fn mutations_bump_version() {
        let mut ctx = sample();
        let v0 = ctx.version();
        ctx.set_time(1.0);
        assert!(ctx.version() > v0);
        let v1 = ctx.version();
        ctx.set_continuous_state(&DVector::zeros(3)).unwrap();
        assert!(ctx.version() > v1);
    }
}
