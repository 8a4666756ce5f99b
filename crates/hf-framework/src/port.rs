//! Port declarations and references.

use hf_core::SystemId;

use crate::value::ValueKind;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// A named, typed data slot declared by a system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub kind: ValueKind,
}

impl PortSpec {
    pub fn vector(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            kind: ValueKind::Vector(width),
        }
    }

    pub fn abstract_value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ValueKind::Abstract,
        }
    }
}

/// Input port of a child system, identified by (owning system, index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputPortRef {
    pub system: SystemId,
    pub index: usize,
}

impl InputPortRef {
    pub fn new(system: SystemId, index: usize) -> Self {
        Self { system, index }
    }
}

/// Output port of a child system, identified by (owning system, index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPortRef {
    pub system: SystemId,
    pub index: usize,
}

impl OutputPortRef {
    pub fn new(system: SystemId, index: usize) -> Self {
        Self { system, index }
    }
}

/// Find a port index by name.
pub fn find_port(ports: &[PortSpec], name: &str) -> Option<usize> {
    ports.iter().position(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_port_by_name() {
        let ports = vec![PortSpec::vector("u", 1), PortSpec::abstract_value("msg")];
        assert_eq!(find_port(&ports, "msg"), Some(1));
        assert_eq!(find_port(&ports, "missing"), None);
        assert_eq!(ports[0].kind, ValueKind::Vector(1));
    }
}
