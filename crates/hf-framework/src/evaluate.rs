//! Pull-based, memoized port evaluation.
//!
//! An `Evaluator` borrows the system tree and one context. Output values are
//! cached per `(record, output port)` for the lifetime of the evaluator, which
//! cannot outlive the context version it was created for. An in-progress set
//! catches algebraic loops that static analysis did not rule out.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use nalgebra::DVector;

use crate::context::{Context, ContextRecord, LeafContext};
use crate::diagram::InputSource;
use crate::error::{EvalError, EvalResult};
use crate::port::{PortDirection, PortSpec};
use crate::system::System;
use crate::value::{Value, ValueKind};

type PortKey = (usize, usize);

pub struct Evaluator<'a> {
    root: &'a System,
    context: &'a Context,
    version: u64,
    cache: RefCell<HashMap<PortKey, Value>>,
    in_progress: RefCell<HashSet<PortKey>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(root: &'a System, context: &'a Context) -> EvalResult<Self> {
        let expected = root.record_count();
        if context.num_records() != expected {
            return Err(EvalError::ContextMismatch {
                expected,
                actual: context.num_records(),
            });
        }
        Ok(Self {
            root,
            context,
            version: context.version(),
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
        })
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Context version the cached values belong to.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn node(&self, record: usize) -> EvalResult<&'a System> {
        self.root
            .node_at(record)
            .ok_or(EvalError::UnknownRecord { record })
    }

    pub(crate) fn record(&self, record: usize) -> EvalResult<&'a ContextRecord> {
        self.context
            .record(record)
            .ok_or(EvalError::UnknownRecord { record })
    }

    pub(crate) fn leaf_context(&self, record: usize) -> EvalResult<LeafContext<'a>> {
        Ok(LeafContext::new(self.context.time(), self.record(record)?))
    }

    pub(crate) fn inputs(&self, record: usize) -> InputPorts<'_> {
        InputPorts {
            evaluator: self,
            record,
        }
    }

    /// Value of output `port` of the system at `record`.
    pub fn eval_output(&self, record: usize, port: usize) -> EvalResult<Value> {
        let key = (record, port);
        if let Some(v) = self.cache.borrow().get(&key) {
            return Ok(v.clone());
        }
        if !self.in_progress.borrow_mut().insert(key) {
            let node = self.node(record)?;
            return Err(EvalError::AlgebraicLoop {
                system: node.name().to_string(),
                port: port_name(node.output_specs(), port),
            });
        }
        let result = self.compute_output(record, port);
        self.in_progress.borrow_mut().remove(&key);
        let value = result?;
        self.cache.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    fn compute_output(&self, record: usize, port: usize) -> EvalResult<Value> {
        let node = self.node(record)?;
        let specs = node.output_specs();
        let spec = specs.get(port).ok_or_else(|| EvalError::PortOutOfRange {
            system: node.name().to_string(),
            direction: PortDirection::Output,
            index: port,
            count: specs.len(),
        })?;
        match node {
            System::Leaf(leaf) => {
                let ctx = self.leaf_context(record)?;
                let value = leaf.calc_output(&ctx, &self.inputs(record), port)?;
                check_kind(node.name(), spec, &value)?;
                Ok(value)
            }
            System::Diagram(diagram) => {
                let (slot, child_port) = diagram.exported_output_source(port).ok_or_else(|| {
                    EvalError::PortOutOfRange {
                        system: node.name().to_string(),
                        direction: PortDirection::Output,
                        index: port,
                        count: specs.len(),
                    }
                })?;
                self.eval_output(record + diagram.child_offset(slot), child_port)
            }
        }
    }

    /// Value of input `port` of the system at `record`.
    ///
    /// Follows the parent diagram's wiring; falls back to a fixed value only
    /// when no parent feeds the port.
    pub fn eval_input(&self, record: usize, port: usize) -> EvalResult<Value> {
        let rec = self.record(record)?;
        let node = self.node(record)?;
        let specs = node.input_specs();
        let spec = specs.get(port).ok_or_else(|| EvalError::PortOutOfRange {
            system: node.name().to_string(),
            direction: PortDirection::Input,
            index: port,
            count: specs.len(),
        })?;

        let source = match rec.parent() {
            Some(parent) => match self.node(parent)? {
                System::Diagram(d) => d.input_source(rec.slot, port).map(|s| (parent, d, s)),
                System::Leaf(_) => None,
            },
            None => None,
        };

        let value = match source {
            Some((parent, d, InputSource::Connection { slot, port: upstream })) => {
                self.eval_output(parent + d.child_offset(slot), upstream)?
            }
            Some((parent, _, InputSource::Exported(index))) => self.eval_input(parent, index)?,
            None => rec
                .fixed_inputs
                .get(port)
                .and_then(Clone::clone)
                .ok_or_else(|| EvalError::DisconnectedInput {
                    system: rec.name.clone(),
                    port: spec.name.clone(),
                })?,
        };
        check_kind(&rec.name, spec, &value)?;
        Ok(value)
    }
}

/// Input access handed to leaf computations.
#[derive(Clone, Copy)]
pub struct InputPorts<'e> {
    evaluator: &'e Evaluator<'e>,
    record: usize,
}

impl<'e> InputPorts<'e> {
    pub fn eval(&self, port: usize) -> EvalResult<Value> {
        self.evaluator.eval_input(self.record, port)
    }

    /// Vector input value. The width was checked against the port declaration.
    pub fn vector(&self, port: usize) -> EvalResult<DVector<f64>> {
        let value = self.eval(port)?;
        let kind = value.kind();
        value.into_vector().ok_or_else(|| self.mismatch(port, kind))
    }

    /// Abstract input value cloned out as `T`.
    pub fn abstract_value<T: Any + Clone>(&self, port: usize) -> EvalResult<T> {
        let value = self.eval(port)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| self.mismatch(port, value.kind()))
    }

    fn mismatch(&self, port: usize, actual: ValueKind) -> EvalError {
        let (system, spec) = match self.evaluator.node(self.record) {
            Ok(node) => (
                node.name().to_string(),
                node.input_specs().get(port).cloned(),
            ),
            Err(_) => (String::new(), None),
        };
        EvalError::PortKindMismatch {
            system,
            port: spec
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| port.to_string()),
            expected: spec.map(|s| s.kind).unwrap_or(ValueKind::Abstract),
            actual,
        }
    }
}

fn port_name(specs: &[PortSpec], port: usize) -> String {
    specs
        .get(port)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| port.to_string())
}

fn check_kind(system: &str, spec: &PortSpec, value: &Value) -> EvalResult<()> {
    let actual = value.kind();
    if actual == spec.kind {
        Ok(())
    } else {
        Err(EvalError::PortKindMismatch {
            system: system.to_string(),
            port: spec.name.clone(),
            expected: spec.kind,
            actual,
        })
    }
}
