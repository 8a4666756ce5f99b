//! Values carried on ports and held in abstract state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

/// Declared shape of the data a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Real vector of fixed width.
    Vector(usize),
    /// Opaque value of any `'static` type.
    Abstract,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Vector(n) => write!(f, "vector[{n}]"),
            ValueKind::Abstract => write!(f, "abstract"),
        }
    }
}

/// A port value.
///
/// Vector values own their data. Abstract values are reference counted so
/// that repeated evaluation and context snapshots stay cheap.
#[derive(Clone)]
pub enum Value {
    Vector(DVector<f64>),
    Abstract(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Vector value from a slice.
    pub fn from_slice(values: &[f64]) -> Self {
        Self::Vector(DVector::from_column_slice(values))
    }

    /// Wrap any thread-safe value as an abstract value.
    pub fn from_abstract<T: Any + Send + Sync>(value: T) -> Self {
        Self::Abstract(Arc::new(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Vector(v) => ValueKind::Vector(v.len()),
            Self::Abstract(_) => ValueKind::Abstract,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<f64>> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Abstract(_) => None,
        }
    }

    pub fn into_vector(self) -> Option<DVector<f64>> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Abstract(_) => None,
        }
    }

    /// Borrow the abstract payload as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Vector(_) => None,
            Self::Abstract(a) => a.downcast_ref::<T>(),
        }
    }
}

impl From<DVector<f64>> for Value {
    fn from(v: DVector<f64>) -> Self {
        Self::Vector(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector(v) => f.debug_tuple("Vector").field(&v.as_slice()).finish(),
            Self::Abstract(_) => f.write_str("Abstract(..)"),
        }
    }
}

/// Vectors compare by element; abstract values compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Vector(a), Self::Vector(b)) => a == b,
            (Self::Abstract(a), Self::Abstract(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_kind_reports_width() {
        let v = Value::from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(v.kind(), ValueKind::Vector(3));
        assert_eq!(v.as_vector().unwrap()[2], 3.0);
    }

    #[test]
    fn abstract_downcast() {
        let v = Value::from_abstract(String::from("hello"));
        assert_eq!(v.kind(), ValueKind::Abstract);
        assert_eq!(v.downcast_ref::<String>().unwrap(), "hello");
        assert!(v.downcast_ref::<u32>().is_none());
        assert!(v.as_vector().is_none());
    }

    #[test]
    fn abstract_equality_is_identity() {
        let a = Value::from_abstract(7_u32);
        let b = a.clone();
        let c = Value::from_abstract(7_u32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
