//! Build-time validation of diagram wiring.

use std::collections::{HashMap, HashSet, VecDeque};

use hf_core::SystemId;

use crate::error::{BuildError, BuildResult};
use crate::port::{InputPortRef, OutputPortRef};
use crate::system::System;

/// Every child input must be wired to a sibling or exported.
pub(crate) fn validate_connected(
    children: &[System],
    connections: &[(OutputPortRef, InputPortRef)],
    exported: &[(String, InputPortRef)],
) -> BuildResult<()> {
    let fed: HashSet<InputPortRef> = connections
        .iter()
        .map(|(_, to)| *to)
        .chain(exported.iter().map(|(_, p)| *p))
        .collect();

    for (slot, child) in children.iter().enumerate() {
        // Children were added through the builder, so every slot has a handle.
        let Some(id) = SystemId::from_slot(slot) else {
            break;
        };
        for (index, spec) in child.input_specs().iter().enumerate() {
            if !fed.contains(&InputPortRef::new(id, index)) {
                return Err(BuildError::DisconnectedInput {
                    system: child.name().to_string(),
                    port: spec.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Same-instant dependency graph over child output ports.
///
/// An edge `a -> b` means output `b` must be computed after output `a`: `a`
/// feeds an input of `b`'s system and that input feeds through to `b`.
/// State-mediated paths have no edge.
pub(crate) struct FeedthroughGraph {
    nodes: Vec<(usize, usize)>,
    index: HashMap<(usize, usize), usize>,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl FeedthroughGraph {
    pub(crate) fn new(children: &[System], connections: &[(OutputPortRef, InputPortRef)]) -> Self {
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for (slot, child) in children.iter().enumerate() {
            for port in 0..child.num_output_ports() {
                index.insert((slot, port), nodes.len());
                nodes.push((slot, port));
            }
        }

        let mut succ = vec![Vec::new(); nodes.len()];
        let mut pred = vec![Vec::new(); nodes.len()];
        for (from, to) in connections {
            let Some(&u) = index.get(&(from.system.slot(), from.index)) else {
                continue;
            };
            let Some(downstream) = children.get(to.system.slot()) else {
                continue;
            };
            for port in 0..downstream.num_output_ports() {
                if !downstream.has_direct_feedthrough(to.index, port) {
                    continue;
                }
                if let Some(&v) = index.get(&(to.system.slot(), port)) {
                    succ[u].push(v);
                    pred[v].push(u);
                }
            }
        }

        Self {
            nodes,
            index,
            succ,
            pred,
        }
    }

    /// Kahn's algorithm; on failure report one concrete cycle.
    pub(crate) fn check_acyclic(&self, children: &[System]) -> BuildResult<()> {
        let mut in_degree: Vec<usize> = self.pred.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&n| in_degree[n] == 0)
            .collect();
        let mut processed = 0;
        while let Some(u) = queue.pop_front() {
            processed += 1;
            for &v in &self.succ[u] {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }
        if processed == self.nodes.len() {
            return Ok(());
        }

        let remaining: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
        let cycle = self.find_cycle(&remaining);
        let mut systems: Vec<String> = Vec::new();
        for node in cycle {
            let name = children
                .get(self.nodes[node].0)
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            if systems.last() != Some(&name) {
                systems.push(name);
            }
        }
        Err(BuildError::AlgebraicLoop { systems })
    }

    /// Every unresolved node has an unresolved predecessor, so walking
    /// predecessors must revisit a node.
    fn find_cycle(&self, remaining: &[bool]) -> Vec<usize> {
        let Some(mut current) = remaining.iter().position(|&r| r) else {
            return Vec::new();
        };
        let mut path = Vec::new();
        let mut seen = HashMap::new();
        loop {
            if let Some(&pos) = seen.get(&current) {
                let mut cycle = path.split_off(pos);
                cycle.reverse();
                return cycle;
            }
            seen.insert(current, path.len());
            path.push(current);
            match self.pred[current].iter().find(|&&p| remaining[p]) {
                Some(&p) => current = p,
                None => return path,
            }
        }
    }

    /// Whether a child input reaches a child output through feedthrough only.
    pub(crate) fn reaches(&self, children: &[System], input: InputPortRef, output: OutputPortRef) -> bool {
        let Some(&target) = self.index.get(&(output.system.slot(), output.index)) else {
            return false;
        };
        let Some(child) = children.get(input.system.slot()) else {
            return false;
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        for port in 0..child.num_output_ports() {
            if child.has_direct_feedthrough(input.index, port) {
                if let Some(&n) = self.index.get(&(input.system.slot(), port)) {
                    visited[n] = true;
                    queue.push_back(n);
                }
            }
        }
        while let Some(u) = queue.pop_front() {
            if u == target {
                return true;
            }
            for &v in &self.succ[u] {
                if !visited[v] {
                    visited[v] = true;
                    queue.push_back(v);
                }
            }
        }
        false
    }
}
